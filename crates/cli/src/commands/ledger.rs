//! Balance, history, credit/debit, and reconciliation commands

use anyhow::{Context, Result};
use loyalty_business::{AppendRequest, LoyaltyService};
use loyalty_core::{parse_amount, OperationKind};

use crate::{AdminAuth, AppendOptions};

pub async fn balance(service: &LoyaltyService, customer_id: &str) -> Result<()> {
    let view = service.get_balance(customer_id).await?;

    println!("💰 Balance for {}", customer_id);
    println!("   Points: {}", view.balance);
    match view.last_transaction_at {
        Some(at) => println!("   Last transaction: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("   No transactions yet"),
    }
    Ok(())
}

pub async fn history(service: &LoyaltyService, customer_id: &str, json: bool) -> Result<()> {
    let entries = service.history(customer_id).await?;

    if json {
        for entry in &entries {
            println!("{}", serde_json::to_string(entry).context("Failed to serialize entry")?);
        }
        return Ok(());
    }

    if entries.is_empty() {
        println!("No transactions for {}", customer_id);
        return Ok(());
    }

    println!("📜 History for {} ({} entries)", customer_id, entries.len());
    for entry in &entries {
        println!("   {}", entry);
    }
    Ok(())
}

pub async fn append(
    service: &LoyaltyService,
    kind: OperationKind,
    customer_id: &str,
    amount: &str,
    auth: AdminAuth,
    options: AppendOptions,
) -> Result<()> {
    let amount = parse_amount(amount).map_err(loyalty_business::LoyaltyError::from)?;
    let mut request = AppendRequest::new(customer_id, kind, amount);
    if let Some(method) = options.payment_method.as_deref() {
        request = request.with_payment_method(method);
    }
    if let Some(token) = options.token.as_deref() {
        request = request.with_transaction_id(token);
    }

    let receipt = service.append(&auth.admin, &auth.pin, request).await?;
    let points = receipt.entry.transaction.points;

    if receipt.duplicate {
        println!("ℹ️  Already recorded (token {})", receipt.entry.transaction.transaction_id);
    } else {
        let verb = match kind {
            OperationKind::Credit => "Credited",
            OperationKind::Debit => "Debited",
        };
        let delta = points.map(|p| p.added + p.deducted).unwrap_or_default();
        println!("✅ {} {} points ({} {})", verb, delta, amount, receipt.entry.transaction.payment_method);
    }
    println!("   New balance: {}", receipt.new_balance);
    println!("   Token:       {}", receipt.entry.transaction.transaction_id);
    Ok(())
}

pub async fn reconcile(service: &LoyaltyService, customer_id: &str) -> Result<()> {
    let report = service.reconcile(customer_id).await?;

    println!("🔍 Reconciliation for {}", customer_id);
    println!("   Entries:          {}", report.entries);
    println!("   Derived balance:  {}", report.derived_balance);
    println!("   Replayed balance: {}", report.replayed_balance);

    if !report.malformed.is_empty() {
        let keys: Vec<String> = report.malformed.iter().map(|k| k.to_string()).collect();
        println!("   ⚠️  Entries without valid points: {}", keys.join(", "));
    }

    if report.is_consistent() {
        println!("   ✅ Ledger is consistent");
    } else {
        println!("   ❌ {} divergence(s):", report.divergences.len());
        for d in &report.divergences {
            println!("      #{} expected {} recorded {}", d.key, d.expected, d.recorded);
        }
    }
    Ok(())
}
