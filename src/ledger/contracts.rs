// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chaincode function names and thin request/response wrappers.
//!
//! | Contract | Functions |
//! |----------|-----------|
//! | `UserContract` | CreateUser, UpdateUser, ReadUser, DeleteUser, GetAllUsers |
//! | `DataContract` | CreateProduct, ReadProduct, UpdateProduct, DeleteProduct, BuyProduct, GetAllProducts, GetHistoryOfProduct |
//! | `AgreementContract` | GetAgreement, GetAgreements, UpdateAgreement |

use serde::Serialize;
use serde_json::Value;

use super::gateway::{CallKind, GatewayError, GatewayResult, GatewaySession};
use crate::models::AgreementStage;

/// A chaincode function, qualified by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractFunction {
    CreateUser,
    UpdateUser,
    ReadUser,
    DeleteUser,
    GetAllUsers,
    CreateProduct,
    ReadProduct,
    UpdateProduct,
    DeleteProduct,
    BuyProduct,
    GetAllProducts,
    GetHistoryOfProduct,
    GetAgreement,
    GetAgreements,
    UpdateAgreement,
}

impl ContractFunction {
    /// `Contract:Function` as the chaincode router expects it.
    pub fn qualified_name(self) -> &'static str {
        match self {
            ContractFunction::CreateUser => "UserContract:CreateUser",
            ContractFunction::UpdateUser => "UserContract:UpdateUser",
            ContractFunction::ReadUser => "UserContract:ReadUser",
            ContractFunction::DeleteUser => "UserContract:DeleteUser",
            ContractFunction::GetAllUsers => "UserContract:GetAllUsers",
            ContractFunction::CreateProduct => "DataContract:CreateProduct",
            ContractFunction::ReadProduct => "DataContract:ReadProduct",
            ContractFunction::UpdateProduct => "DataContract:UpdateProduct",
            ContractFunction::DeleteProduct => "DataContract:DeleteProduct",
            ContractFunction::BuyProduct => "DataContract:BuyProduct",
            ContractFunction::GetAllProducts => "DataContract:GetAllProducts",
            ContractFunction::GetHistoryOfProduct => "DataContract:GetHistoryOfProduct",
            ContractFunction::GetAgreement => "AgreementContract:GetAgreement",
            ContractFunction::GetAgreements => "AgreementContract:GetAgreements",
            ContractFunction::UpdateAgreement => "AgreementContract:UpdateAgreement",
        }
    }

    /// Evaluate for queries, submit for state changes.
    pub fn call_kind(self) -> CallKind {
        match self {
            ContractFunction::ReadUser
            | ContractFunction::GetAllUsers
            | ContractFunction::ReadProduct
            | ContractFunction::GetAllProducts
            | ContractFunction::GetHistoryOfProduct
            | ContractFunction::GetAgreement
            | ContractFunction::GetAgreements => CallKind::Evaluate,
            _ => CallKind::Submit,
        }
    }
}

/// A function plus its positional string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub function: ContractFunction,
    pub args: Vec<String>,
}

impl ContractCall {
    fn new(function: ContractFunction, args: Vec<String>) -> Self {
        Self { function, args }
    }

    fn with_json<T: Serialize>(function: ContractFunction, doc: &T) -> GatewayResult<Self> {
        let arg = serde_json::to_string(doc)
            .map_err(|e| GatewayError::Protocol(format!("cannot encode argument: {e}")))?;
        Ok(Self::new(function, vec![arg]))
    }

    pub fn create_user<T: Serialize>(user: &T) -> GatewayResult<Self> {
        Self::with_json(ContractFunction::CreateUser, user)
    }

    pub fn update_user<T: Serialize>(user: &T) -> GatewayResult<Self> {
        Self::with_json(ContractFunction::UpdateUser, user)
    }

    pub fn read_user(username: &str) -> Self {
        Self::new(ContractFunction::ReadUser, vec![username.to_string()])
    }

    pub fn delete_user(username: &str) -> Self {
        Self::new(ContractFunction::DeleteUser, vec![username.to_string()])
    }

    pub fn all_users() -> Self {
        Self::new(ContractFunction::GetAllUsers, Vec::new())
    }

    pub fn create_product<T: Serialize>(product: &T) -> GatewayResult<Self> {
        Self::with_json(ContractFunction::CreateProduct, product)
    }

    pub fn update_product<T: Serialize>(product: &T) -> GatewayResult<Self> {
        Self::with_json(ContractFunction::UpdateProduct, product)
    }

    pub fn read_product(id: &str) -> Self {
        Self::new(ContractFunction::ReadProduct, vec![id.to_string()])
    }

    pub fn delete_product(id: &str) -> Self {
        Self::new(ContractFunction::DeleteProduct, vec![id.to_string()])
    }

    pub fn buy_product<T: Serialize>(id: &str, buyer_params: &T) -> GatewayResult<Self> {
        let params = serde_json::to_string(buyer_params)
            .map_err(|e| GatewayError::Protocol(format!("cannot encode argument: {e}")))?;
        Ok(Self::new(ContractFunction::BuyProduct, vec![id.to_string(), params]))
    }

    pub fn all_products() -> Self {
        Self::new(ContractFunction::GetAllProducts, Vec::new())
    }

    pub fn product_history(id: &str) -> Self {
        Self::new(ContractFunction::GetHistoryOfProduct, vec![id.to_string()])
    }

    pub fn read_agreement(tx_id: &str) -> Self {
        Self::new(ContractFunction::GetAgreement, vec![tx_id.to_string()])
    }

    pub fn all_agreements() -> Self {
        Self::new(ContractFunction::GetAgreements, Vec::new())
    }

    pub fn update_agreement(tx_id: &str, stage: AgreementStage) -> Self {
        Self::new(
            ContractFunction::UpdateAgreement,
            vec![tx_id.to_string(), stage.name().to_string()],
        )
    }
}

/// Contract calls over a borrowed session.
pub struct ContractGateway<'a> {
    session: &'a dyn GatewaySession,
}

impl<'a> ContractGateway<'a> {
    pub fn new(session: &'a dyn GatewaySession) -> Self {
        Self { session }
    }

    /// Evaluate or submit, depending on the function.
    pub async fn call(&self, call: &ContractCall) -> GatewayResult<Vec<u8>> {
        let name = call.function.qualified_name();
        tracing::debug!(function = name, args = call.args.len(), "Contract call");
        match call.function.call_kind() {
            CallKind::Evaluate => self.session.evaluate(name, &call.args).await,
            _ => self.session.submit(name, &call.args).await,
        }
    }

    /// Call and parse the response as JSON. An empty response is `null`.
    pub async fn call_json(&self, call: &ContractCall) -> GatewayResult<Value> {
        let bytes = self.call(call).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            GatewayError::Protocol(format!(
                "{} returned invalid JSON: {e}",
                call.function.qualified_name()
            ))
        })
    }

    /// Call a `GetAll*` style function. `null` is an empty set.
    pub async fn call_list(&self, call: &ContractCall) -> GatewayResult<Vec<Value>> {
        match self.call_json(call).await? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items),
            other => Err(GatewayError::Protocol(format!(
                "{} returned {} instead of a list",
                call.function.qualified_name(),
                json_kind(&other)
            ))),
        }
    }

    pub async fn all_users(&self) -> GatewayResult<Vec<Value>> {
        self.call_list(&ContractCall::all_users()).await
    }

    pub async fn all_products(&self) -> GatewayResult<Vec<Value>> {
        self.call_list(&ContractCall::all_products()).await
    }

    pub async fn all_agreements(&self) -> GatewayResult<Vec<Value>> {
        self.call_list(&ContractCall::all_agreements()).await
    }

    pub async fn read_user(&self, username: &str) -> GatewayResult<Value> {
        self.call_json(&ContractCall::read_user(username)).await
    }

    pub async fn read_product(&self, id: &str) -> GatewayResult<Value> {
        self.call_json(&ContractCall::read_product(id)).await
    }

    pub async fn read_agreement(&self, tx_id: &str) -> GatewayResult<Value> {
        self.call_json(&ContractCall::read_agreement(tx_id)).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
