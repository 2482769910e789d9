//! JSON over http front of the [`Ledger`]

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::error;

use crate::{account::Profile, amount::Amount, errors::LedgerErr, ledger::Ledger};

/// Shared state of every handler
pub type AppState = Arc<Ledger>;

/// Build router serving all ledger endpoints. Requests taking longer than `request_timeout`
/// are answered with `408`.
pub fn router(ledger: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/dashboard/:account_number", get(dashboard))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/transfer", post(transfer))
        .route("/transactions/:account_number", get(transactions))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ledger)
}

/// `POST /register` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct RegisterRequest {
    pub username: String,
    pub name: String,
    pub surname: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "identityNumber")]
    pub id_number: String,
    pub password: String,
}

/// `POST /login` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `POST /deposit` and `POST /withdraw` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MoneyRequest {
    pub account_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// `POST /transfer` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TransferRequest {
    pub source_account_number: String,
    pub recipient_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Success message, with account number for register and login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

impl MessageResponse {
    fn new(message: String) -> Self {
        Self {
            message,
            account_number: None,
        }
    }
}

/// `GET /dashboard/{account_number}` answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DashboardResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub transactions: Vec<String>,
}

/// `GET /transactions/{account_number}` answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TransactionsResponse {
    pub transactions: Vec<String>,
}

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ErrorResponse {
    pub error: String,
}

impl LedgerErr {
    /// Http status reported for this error
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerErr::NotFound | LedgerErr::SourceNotFound | LedgerErr::RecipientNotFound => {
                StatusCode::NOT_FOUND
            }
            LedgerErr::InvalidCredentials => StatusCode::UNAUTHORIZED,
            LedgerErr::AlreadyExists
            | LedgerErr::InvalidUsername(_)
            | LedgerErr::InvalidAccountNumber(_)
            | LedgerErr::Balance(_)
            | LedgerErr::Amount(_) => StatusCode::BAD_REQUEST,
            LedgerErr::Corrupt { .. }
            | LedgerErr::Log(_)
            | LedgerErr::PasswordHash(_)
            | LedgerErr::Aborted
            | LedgerErr::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerErr {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn register(
    State(ledger): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), LedgerErr> {
    let profile = Profile {
        name: req.name,
        surname: req.surname,
        phone_number: req.phone_number,
        id_number: req.id_number,
    };
    let account_number = ledger
        .register(&req.username, profile, &req.password)
        .await?;

    let body = MessageResponse {
        message: "Account created successfully".to_owned(),
        account_number: Some(account_number),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

async fn login(
    State(ledger): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<MessageResponse>, LedgerErr> {
    let account_number = ledger.login(&req.username, &req.password).await?;

    Ok(Json(MessageResponse {
        message: "Login successful".to_owned(),
        account_number: Some(account_number),
    }))
}

async fn dashboard(
    State(ledger): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<DashboardResponse>, LedgerErr> {
    let dashboard = ledger.dashboard(&account_number).await?;

    Ok(Json(DashboardResponse {
        balance: dashboard.balance,
        transactions: dashboard.transactions,
    }))
}

async fn deposit(
    State(ledger): State<AppState>,
    Json(req): Json<MoneyRequest>,
) -> Result<Json<MessageResponse>, LedgerErr> {
    let amount = Amount::try_from(req.amount)?;
    ledger.deposit(&req.account_number, &amount).await?;

    Ok(Json(MessageResponse::new(format!(
        "Deposited {amount} successfully"
    ))))
}

async fn withdraw(
    State(ledger): State<AppState>,
    Json(req): Json<MoneyRequest>,
) -> Result<Json<MessageResponse>, LedgerErr> {
    let amount = Amount::try_from(req.amount)?;
    ledger.withdraw(&req.account_number, &amount).await?;

    Ok(Json(MessageResponse::new(format!(
        "Withdrew {amount} successfully"
    ))))
}

async fn transfer(
    State(ledger): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<MessageResponse>, LedgerErr> {
    let amount = Amount::try_from(req.amount)?;
    ledger
        .transfer(&req.source_account_number, &req.recipient_name, &amount)
        .await?;

    Ok(Json(MessageResponse::new(format!(
        "Transferred {amount} to {} successfully",
        req.recipient_name
    ))))
}

async fn transactions(
    State(ledger): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<TransactionsResponse>, LedgerErr> {
    let transactions = ledger.transactions(&account_number).await?;
    Ok(Json(TransactionsResponse { transactions }))
}
