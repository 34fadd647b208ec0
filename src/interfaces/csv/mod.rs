pub mod account_writer;
pub mod command_reader;
pub mod wallet_reader;
