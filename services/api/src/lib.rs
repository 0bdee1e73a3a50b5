mod cli;
mod infra;
mod quote;
mod routes;
mod server;

use enrollment_pay::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
