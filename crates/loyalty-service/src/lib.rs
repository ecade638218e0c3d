//! # loyalty-service
//!
//! Application layer: the transaction handlers that drive the points ledger,
//! promotion eligibility, event pools, and account management, plus the
//! request/response DTOs shared with the HTTP layer.

pub mod dto;
pub mod services;

pub use services::{
    AccountService, EventService, PromotionService, ServiceContext, ServiceContextBuilder,
    ServiceError, ServiceResult, TransactionService, UserService,
};
