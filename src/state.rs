use std::sync::Arc;

use crate::{
    db::{DbPool, OrmConn},
    payment::PaymentGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub gateway: Arc<dyn PaymentGateway>,
    pub currency: String,
}
