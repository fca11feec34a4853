mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use conduct_engine::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
