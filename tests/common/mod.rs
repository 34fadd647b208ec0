#![allow(dead_code)]

pub mod flaky;

use money_movement::application::config::ServiceConfig;
use money_movement::application::service::{AuthorizeRequest, MoneyMovementService, WalletProvision};
use money_movement::domain::account::{AccountRole, Balance, WalletKind};
use money_movement::domain::ports::{EventPublisherRef, LedgerStoreRef};
use money_movement::infrastructure::broker::InMemoryBroker;
use money_movement::infrastructure::in_memory::InMemoryLedgerStore;
use rand::Rng;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const CUSTOMER: &str = "alice";
pub const MERCHANT: &str = "shop";

pub fn service_with(store: LedgerStoreRef, publisher: EventPublisherRef) -> MoneyMovementService {
    MoneyMovementService::new(store, publisher, ServiceConfig::default())
}

/// In-memory service plus a handle on its broker.
pub fn in_memory_service() -> (MoneyMovementService, InMemoryBroker) {
    let broker = InMemoryBroker::new();
    let service = service_with(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(broker.clone()),
    );
    (service, broker)
}

pub fn customer(user_id: &str, default_cents: i64) -> WalletProvision {
    WalletProvision {
        user_id: user_id.to_string(),
        kind: WalletKind::Customer,
        accounts: vec![
            (AccountRole::Default, Balance::new(default_cents).unwrap()),
            (AccountRole::Payment, Balance::ZERO),
        ],
    }
}

pub fn merchant(user_id: &str) -> WalletProvision {
    WalletProvision {
        user_id: user_id.to_string(),
        kind: WalletKind::Merchant,
        accounts: vec![(AccountRole::Incoming, Balance::ZERO)],
    }
}

/// Seeds `alice` with `default_cents` and an empty `shop` merchant.
pub async fn seed(service: &MoneyMovementService, default_cents: i64) {
    service.provision_wallet(&customer(CUSTOMER, default_cents)).await.unwrap();
    service.provision_wallet(&merchant(MERCHANT)).await.unwrap();
}

pub fn request(cents: i64, currency: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        customer_wallet_user_id: CUSTOMER.to_string(),
        merchant_wallet_user_id: MERCHANT.to_string(),
        cents,
        currency: currency.to_string(),
    }
}

pub async fn balance_of(service: &MoneyMovementService, user_id: &str, role: AccountRole) -> i64 {
    service
        .balances()
        .await
        .unwrap()
        .into_iter()
        .find(|row| row.user_id == user_id && row.account_type == role)
        .map(|row| row.cents)
        .unwrap_or_else(|| panic!("no {role} account for {user_id}"))
}

pub async fn total(service: &MoneyMovementService) -> i64 {
    service.balances().await.unwrap().iter().map(|row| row.cents).sum()
}

pub fn csv_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

pub fn wallets_csv() -> NamedTempFile {
    csv_file(&[
        "user_id, wallet_type, default, payment, incoming",
        "alice, customer, 1000, 0, ",
        "bob, customer, 100, 0, ",
        "shop, merchant, , , 0",
    ])
}

/// Writes a wallet seed with `customers` funded customers and one merchant.
/// Returns the total cents seeded.
pub fn generate_wallets_csv(path: &Path, customers: usize, opening_cents: i64) -> io::Result<i64> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "user_id,wallet_type,default,payment,incoming")?;
    for i in 1..=customers {
        writeln!(file, "c-{i},customer,{opening_cents},0,")?;
    }
    writeln!(file, "{MERCHANT},merchant,,,0")?;
    file.flush()?;
    Ok(customers as i64 * opening_cents)
}

/// Writes `payments` random authorizations against `c-1..=c-customers`,
/// most of them followed by a capture a few rows later.
pub fn generate_commands_csv(path: &Path, payments: usize, customers: usize) -> io::Result<()> {
    let mut rng = rand::thread_rng();
    let mut file = BufWriter::new(File::create(path)?);
    let mut pending: Vec<usize> = Vec::new();

    writeln!(file, "type,reference,customer,merchant,cents,currency")?;
    for i in 0..payments {
        let customer = rng.gen_range(1..=customers);
        let cents = rng.gen_range(1..=5_000);
        writeln!(file, "authorize,p-{i},c-{customer},{MERCHANT},{cents},USD")?;
        if rng.gen_bool(0.7) {
            pending.push(i);
        }
        if pending.len() > 8 || (rng.gen_bool(0.3) && !pending.is_empty()) {
            let idx = rng.gen_range(0..pending.len());
            let reference = pending.swap_remove(idx);
            writeln!(file, "capture,p-{reference},,,,")?;
        }
    }
    for reference in pending {
        writeln!(file, "capture,p-{reference},,,,")?;
    }
    file.flush()?;
    Ok(())
}

/// Parses the balances CSV printed by the binary.
pub fn parse_balances(stdout: &[u8]) -> Vec<(String, String, String, i64)> {
    let mut reader = csv::Reader::from_reader(stdout);
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            (
                record[0].to_string(),
                record[1].to_string(),
                record[2].to_string(),
                record[3].parse().unwrap(),
            )
        })
        .collect()
}
