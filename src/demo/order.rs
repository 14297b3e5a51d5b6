//! Order processing: payment and inventory calls joined into one result

use crate::concurrency::{combine, combine_async};
use crate::errors::{JoinError, TaskFailure};
use std::thread;
use std::time::Duration;
use tracing::info;

pub const PAYMENT_OK: &str = "PAYMENT_OK";
pub const INVENTORY_OK: &str = "INVENTORY_OK";

#[derive(Debug, Clone)]
pub struct AsyncOrderService {
    delay: Duration,
}

impl AsyncOrderService {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    fn payment(delay: Duration) -> Result<&'static str, TaskFailure> {
        thread::sleep(delay);
        info!("Payment completed");
        Ok(PAYMENT_OK)
    }

    fn inventory(delay: Duration) -> Result<&'static str, TaskFailure> {
        thread::sleep(delay);
        info!("Inventory updated");
        Ok(INVENTORY_OK)
    }

    fn merge(payment: &str, inventory: &str) -> String {
        format!("{} & {}", payment, inventory)
    }

    /// Call both services concurrently and block until the order is processed
    pub fn process_order(&self) -> Result<String, JoinError> {
        info!("Starting order processing");
        let delay = self.delay;
        let mut processed = String::new();

        combine(
            move || Self::payment(delay),
            move || Self::inventory(delay),
            |p, i| Self::merge(p, i),
            |result| {
                info!(result = %result, "Order processed successfully");
                processed = result;
            },
        )?;
        Ok(processed)
    }

    pub async fn process_order_async(&self) -> Result<String, JoinError> {
        info!("Starting order processing");
        let delay = self.delay;
        let mut processed = String::new();

        combine_async(
            move || Self::payment(delay),
            move || Self::inventory(delay),
            |p, i| Self::merge(p, i),
            |result| {
                info!(result = %result, "Order processed successfully");
                processed = result;
            },
        )
        .await?;
        Ok(processed)
    }
}
