//! # Financial Summary
//!
//! Folds the fetched collections into the dashboard's headline numbers.
//!
//! ```text
//! sales ─────────► total_approved_revenue ──┐
//! infra costs ───► total_infra_cost ────────┼──► projected_net_profit
//! ledger entries ► total_operating_expense ─┘
//! bank accounts ─► consolidated_cash_balance (USD × fixed rate)
//! ```
//!
//! Every fold is a plain sum: empty input yields zero and the order of the
//! input does not matter.
//!
//! `projected_net_profit` is a display estimate. It ignores taxes and does
//! not subtract commission payouts; it is not an accounting statement.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{ExchangeRate, Money};
use crate::rules::FinanceRules;
use crate::types::{BankAccount, EntryType, InfraCost, LedgerEntry, Sale};

/// Gross of approved sales.
pub fn total_approved_revenue(sales: &[Sale]) -> Money {
    sales.iter().filter(|s| s.is_approved()).map(|s| s.gross).sum()
}

/// Messaging spend, every record counted.
pub fn total_infra_cost(costs: &[InfraCost]) -> Money {
    costs.iter().map(|c| c.total_cost).sum()
}

/// Net amount of Expense entries.
pub fn total_operating_expense(entries: &[LedgerEntry]) -> Money {
    sum_entries(entries, EntryType::Expense)
}

/// Net amount of Revenue entries. Not part of the projected profit.
pub fn total_ledger_revenue(entries: &[LedgerEntry]) -> Money {
    sum_entries(entries, EntryType::Revenue)
}

fn sum_entries(entries: &[LedgerEntry], entry_type: EntryType) -> Money {
    entries
        .iter()
        .filter(|e| e.entry_type == entry_type)
        .map(|e| e.net)
        .sum()
}

/// Cash across accounts in BRL. Non-local balances use `usd_brl`.
pub fn consolidated_cash_balance(accounts: &[BankAccount], usd_brl: ExchangeRate) -> Money {
    accounts
        .iter()
        .map(|a| {
            if a.currency.is_local() {
                a.balance
            } else {
                a.balance.convert(usd_brl)
            }
        })
        .sum()
}

/// Revenue minus infra and operating expense.
pub fn projected_net_profit(revenue: Money, infra: Money, opex: Money) -> Money {
    revenue - infra - opex
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSummary {
    pub approved_revenue: Money,
    pub infra_cost: Money,
    pub operating_expense: Money,
    pub ledger_revenue: Money,
    pub cash_balance: Money,
    pub projected_net_profit: Money,
}

/// Builds the summary from whatever collections were loaded.
pub fn summarize(
    sales: &[Sale],
    costs: &[InfraCost],
    entries: &[LedgerEntry],
    accounts: &[BankAccount],
    rules: &FinanceRules,
) -> DashboardSummary {
    let approved_revenue = total_approved_revenue(sales);
    let infra_cost = total_infra_cost(costs);
    let operating_expense = total_operating_expense(entries);

    DashboardSummary {
        approved_revenue,
        infra_cost,
        operating_expense,
        ledger_revenue: total_ledger_revenue(entries),
        cash_balance: consolidated_cash_balance(accounts, rules.usd_brl_rate),
        projected_net_profit: projected_net_profit(approved_revenue, infra_cost, operating_expense),
    }
}
