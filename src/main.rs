use crate::cli::run;

mod certificate;
pub mod cli;
mod config;
pub mod domain;
pub mod http;
mod public_endpoint;
pub mod service;
pub mod storage;

fn main() {
    if let Err(e) = run() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
