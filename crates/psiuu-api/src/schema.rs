//! # Wire Schema
//!
//! Typed view of the finance API payloads and their conversion into
//! `psiuu-core` types.
//!
//! ## Parse Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   response body (text)                                                  │
//! │        │  serde_json::from_str::<Envelope>                              │
//! │        ▼                                                                │
//! │   WireSale / WirePayout / ...   (dashboard field names: valorBruto,    │
//! │        │                          comissaoInfluencer, dateCreated)      │
//! │        │  WireRecord::into_domain                                       │
//! │        ▼                                                                │
//! │   Sale / Payout / ...           (centavos, enums, UTC timestamps)      │
//! │                                                                         │
//! │   Any failure → ApiError::Schema { endpoint, reason }                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Envelopes are strict: a list endpoint that answers without its `data`
//! field is an error, not an empty list.

use chrono::{DateTime, NaiveDate, Utc};
use psiuu_core::{
    Agent, BankAccount, BeneficiaryType, Currency, EntryStatus, EntryType, InfraChannel, InfraCost,
    InfraProvider, Influencer, LedgerEntry, Money, PackageTier, PartnerStatus, Payout, PayoutStatus,
    PaymentMethod, Sale, SaleStatus,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

// =============================================================================
// Endpoints
// =============================================================================

pub const SALES: &str = "/finance/sales";
pub const INFLUENCERS: &str = "/finance/influencers";
pub const AGENTS: &str = "/finance/agents";
pub const PAYOUTS: &str = "/finance/payouts";
pub const ENTRIES: &str = "/finance/entries";
pub const BANK_ACCOUNTS: &str = "/finance/bank-accounts";
pub const SMS_STATS: &str = "/sms/stats";
pub const WHATSAPP_STATS: &str = "/whatsapp/stats";

/// `POST /finance/payouts/{id}/process`: reviewer approval.
pub const APPROVE_ACTION: &str = "process";

/// `POST /finance/payouts/{id}/complete`: money sent.
pub const PAY_ACTION: &str = "complete";

/// `POST /finance/payouts/{id}/cancel` with a reason body.
pub const REJECT_ACTION: &str = "cancel";

/// Raw path segments of a payout action. Each one is percent-encoded when
/// pushed onto the base URL, so ids never change the path shape.
pub fn payout_action_segments<'a>(payout_id: &'a str, action: &'a str) -> impl Iterator<Item = &'a str> {
    PAYOUTS
        .split('/')
        .filter(|s| !s.is_empty())
        .chain([payout_id, action])
}

/// Body of the rejection call.
#[derive(Debug, Serialize)]
pub struct RejectBody<'a> {
    pub reason: &'a str,
}

// =============================================================================
// Envelopes
// =============================================================================

/// `{ "data": [...] }`
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
}

/// `{ "sales": { "data": [...] } }`
#[derive(Debug, Deserialize)]
pub struct SalesEnvelope {
    pub sales: DataEnvelope<WireSale>,
}

/// `{ "data": { "sent_today": .., "cost_today": .., "avg_cost": .. } }`
#[derive(Debug, Deserialize)]
pub struct StatsEnvelope {
    pub data: MessagingStats,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct MessagingStats {
    #[serde(default)]
    pub sent_today: u64,
    #[serde(default)]
    pub cost_today: f64,
    #[serde(default)]
    pub avg_cost: f64,
}

// =============================================================================
// Decoding
// =============================================================================

/// A wire record that converts into a domain value.
pub trait WireRecord {
    type Domain;

    /// Converts, or explains what is wrong with the record.
    fn into_domain(self) -> Result<Self::Domain, String>;
}

/// Parses a response body, tagging failures with the endpoint.
pub fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> ApiResult<T> {
    serde_json::from_str(body).map_err(|e| ApiError::schema(endpoint, e.to_string()))
}

/// Converts every record; the first bad one fails the whole list.
pub fn convert_all<W: WireRecord>(endpoint: &str, records: Vec<W>) -> ApiResult<Vec<W::Domain>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            r.into_domain()
                .map_err(|reason| ApiError::schema(endpoint, format!("record {}: {}", i, reason)))
        })
        .collect()
}

pub fn parse_sales(body: &str) -> ApiResult<Vec<Sale>> {
    let envelope: SalesEnvelope = decode(SALES, body)?;
    convert_all(SALES, envelope.sales.data)
}

pub fn parse_influencers(body: &str) -> ApiResult<Vec<Influencer>> {
    let envelope: DataEnvelope<WireInfluencer> = decode(INFLUENCERS, body)?;
    convert_all(INFLUENCERS, envelope.data)
}

pub fn parse_agents(body: &str) -> ApiResult<Vec<Agent>> {
    let envelope: DataEnvelope<WireAgent> = decode(AGENTS, body)?;
    convert_all(AGENTS, envelope.data)
}

pub fn parse_payouts(body: &str) -> ApiResult<Vec<Payout>> {
    let envelope: DataEnvelope<WirePayout> = decode(PAYOUTS, body)?;
    convert_all(PAYOUTS, envelope.data)
}

pub fn parse_entries(body: &str) -> ApiResult<Vec<LedgerEntry>> {
    let envelope: DataEnvelope<WireEntry> = decode(ENTRIES, body)?;
    convert_all(ENTRIES, envelope.data)
}

/// Bank accounts come back as a bare array.
pub fn parse_bank_accounts(body: &str) -> ApiResult<Vec<BankAccount>> {
    let records: Vec<WireBankAccount> = decode(BANK_ACCOUNTS, body)?;
    convert_all(BANK_ACCOUNTS, records)
}

/// Today's messaging spend for one channel.
pub fn parse_messaging_stats(
    endpoint: &str,
    body: &str,
    channel: InfraChannel,
    now: DateTime<Utc>,
) -> ApiResult<InfraCost> {
    let envelope: StatsEnvelope = decode(endpoint, body)?;
    stats_to_cost(envelope.data, channel, now).map_err(|reason| ApiError::schema(endpoint, reason))
}

fn stats_to_cost(stats: MessagingStats, channel: InfraChannel, now: DateTime<Utc>) -> Result<InfraCost, String> {
    let (id, provider) = match channel {
        InfraChannel::Sms => ("sms-today", InfraProvider::Twilio),
        InfraChannel::WhatsApp => ("whatsapp-today", InfraProvider::Meta),
        InfraChannel::Email => ("email-today", InfraProvider::SendGrid),
    };
    if !stats.avg_cost.is_finite() || stats.avg_cost < 0.0 {
        return Err("avg_cost must be a non-negative number".to_string());
    }

    Ok(InfraCost {
        id: id.to_string(),
        date: now,
        channel,
        provider,
        quantity: stats.sent_today,
        unit_cost_brl: stats.avg_cost,
        total_cost: money("cost_today", stats.cost_today)?,
    })
}

// =============================================================================
// Field Helpers
// =============================================================================

fn money(field: &str, value: f64) -> Result<Money, String> {
    Money::try_from_non_negative_decimal(field, value).map_err(|e| e.to_string())
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
fn timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("{} '{}' is not a date", field, value))
}

/// Empty strings count as absent.
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn unknown(field: &str, value: &str) -> String {
    format!("unknown {} '{}'", field, value)
}

fn sale_status(value: &str) -> Result<SaleStatus, String> {
    match value {
        "Aprovado" | "approved" => Ok(SaleStatus::Approved),
        "Pendente" | "pending" => Ok(SaleStatus::Pending),
        "Estornado" | "reversed" | "refunded" => Ok(SaleStatus::Reversed),
        other => Err(unknown("sale status", other)),
    }
}

fn payment_method(value: &str) -> Result<PaymentMethod, String> {
    match value {
        "Credit Card" | "credit_card" => Ok(PaymentMethod::CreditCard),
        "Pix" | "pix" => Ok(PaymentMethod::Pix),
        "In-App Purchase" | "in_app_purchase" => Ok(PaymentMethod::InAppPurchase),
        other => Err(unknown("payment method", other)),
    }
}

fn partner_status(value: &str) -> Result<PartnerStatus, String> {
    match value {
        "Ativo" | "active" => Ok(PartnerStatus::Active),
        "Inativo" | "inactive" => Ok(PartnerStatus::Inactive),
        other => Err(unknown("partner status", other)),
    }
}

fn payout_status(value: &str) -> Result<PayoutStatus, String> {
    match value {
        "Aguardando Nota" | "awaiting_invoice" => Ok(PayoutStatus::AwaitingInvoice),
        "Em Análise" | "under_review" => Ok(PayoutStatus::UnderReview),
        "Aprovado" | "approved" => Ok(PayoutStatus::Approved),
        "Pago" | "paid" => Ok(PayoutStatus::Paid),
        "Rejeitado" | "rejected" => Ok(PayoutStatus::Rejected),
        other => Err(unknown("payout status", other)),
    }
}

fn beneficiary_type(value: &str) -> Result<BeneficiaryType, String> {
    match value {
        "Influencer" | "influencer" => Ok(BeneficiaryType::Influencer),
        "Agent" | "agent" => Ok(BeneficiaryType::Agent),
        other => Err(unknown("beneficiary type", other)),
    }
}

fn entry_status(value: &str) -> Result<EntryStatus, String> {
    match value {
        "Confirmado" | "confirmed" => Ok(EntryStatus::Confirmed),
        "Pendente" | "pending" => Ok(EntryStatus::Pending),
        "Estornado" | "reversed" => Ok(EntryStatus::Reversed),
        other => Err(unknown("entry status", other)),
    }
}

fn entry_type(value: &str) -> Result<EntryType, String> {
    match value {
        "Receita" | "revenue" => Ok(EntryType::Revenue),
        "Despesa" | "expense" => Ok(EntryType::Expense),
        other => Err(unknown("entry type", other)),
    }
}

// =============================================================================
// Wire Records
// =============================================================================

/// `Venda` as the API sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSale {
    pub id: String,
    pub data: String,
    pub user_id: String,
    pub package_type: String,
    pub valor_bruto: f64,
    pub store_fee: f64,
    #[serde(default)]
    pub influencer_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub comissao_influencer: f64,
    #[serde(default)]
    pub comissao_agent: f64,
    pub status: String,
    pub payment_method: String,
}

impl WireRecord for WireSale {
    type Domain = Sale;

    fn into_domain(self) -> Result<Sale, String> {
        let tier: PackageTier = self.package_type.parse().map_err(|e: psiuu_core::CoreError| e.to_string())?;
        Ok(Sale {
            created_at: timestamp("data", &self.data)?,
            buyer_id: self.user_id,
            tier,
            gross: money("valorBruto", self.valor_bruto)?,
            store_fee: money("storeFee", self.store_fee)?,
            influencer_id: optional(self.influencer_id),
            agent_id: optional(self.agent_id),
            influencer_commission: money("comissaoInfluencer", self.comissao_influencer)?,
            agent_commission: money("comissaoAgent", self.comissao_agent)?,
            status: sale_status(&self.status)?,
            payment_method: payment_method(&self.payment_method)?,
            id: self.id,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireInfluencer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub coupon_code: String,
    #[serde(default)]
    pub instagram_handle: String,
    pub status: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub total_sales: u32,
    #[serde(default)]
    pub balance_available: f64,
    pub registration_date: String,
}

impl WireRecord for WireInfluencer {
    type Domain = Influencer;

    fn into_domain(self) -> Result<Influencer, String> {
        Ok(Influencer {
            status: partner_status(&self.status)?,
            agent_id: optional(self.agent_id),
            balance_available: money("balanceAvailable", self.balance_available)?,
            registered_at: timestamp("registrationDate", &self.registration_date)?,
            id: self.id,
            name: self.name,
            coupon_code: self.coupon_code,
            instagram_handle: self.instagram_handle,
            total_sales: self.total_sales,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAgent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub influencers_count: u32,
    #[serde(default)]
    pub balance_available: f64,
    pub status: String,
}

impl WireRecord for WireAgent {
    type Domain = Agent;

    fn into_domain(self) -> Result<Agent, String> {
        Ok(Agent {
            balance_available: money("balanceAvailable", self.balance_available)?,
            status: partner_status(&self.status)?,
            id: self.id,
            name: self.name,
            email: self.email,
            influencers_count: self.influencers_count,
        })
    }
}

/// Payouts from the API may omit `beneficiaryId`; the name stands in for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayout {
    pub id: String,
    #[serde(default)]
    pub beneficiary_id: Option<String>,
    pub beneficiary_name: String,
    pub beneficiary_type: String,
    pub amount: f64,
    pub status: String,
    pub date_created: String,
    pub due_date: String,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
}

impl WireRecord for WirePayout {
    type Domain = Payout;

    fn into_domain(self) -> Result<Payout, String> {
        let amount = money("amount", self.amount)?;
        if !amount.is_positive() {
            return Err("amount must be positive".to_string());
        }
        let beneficiary_id = optional(self.beneficiary_id).unwrap_or_else(|| self.beneficiary_name.clone());

        Ok(Payout {
            id: self.id,
            beneficiary_id,
            beneficiary_name: self.beneficiary_name,
            beneficiary_type: beneficiary_type(&self.beneficiary_type)?,
            amount,
            status: payout_status(&self.status)?,
            created_at: timestamp("dateCreated", &self.date_created)?,
            due_date: timestamp("dueDate", &self.due_date)?,
            invoice_ref: optional(self.invoice_url),
            rejection_reason: optional(self.rejection_reason),
            ticket_id: optional(self.ticket_id),
        })
    }
}

/// `Lancamento` as the API sends it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntry {
    pub id: String,
    pub data: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub cost_center_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parceiro: String,
    pub valor_bruto: f64,
    pub valor_liquido: f64,
    pub status: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

impl WireRecord for WireEntry {
    type Domain = LedgerEntry;

    fn into_domain(self) -> Result<LedgerEntry, String> {
        Ok(LedgerEntry {
            date: timestamp("data", &self.data)?,
            gross: money("valorBruto", self.valor_bruto)?,
            net: money("valorLiquido", self.valor_liquido)?,
            status: entry_status(&self.status)?,
            entry_type: entry_type(&self.entry_type)?,
            id: self.id,
            account_id: optional(self.account_id),
            cost_center_id: optional(self.cost_center_id),
            description: self.description,
            partner: self.parceiro,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBankAccount {
    pub id: String,
    pub bank_name: String,
    #[serde(default)]
    pub account_number: String,
    /// Overdrafts are allowed, so this may be negative.
    pub balance: f64,
    pub currency: String,
}

impl WireRecord for WireBankAccount {
    type Domain = BankAccount;

    fn into_domain(self) -> Result<BankAccount, String> {
        let currency: Currency = self.currency.parse().map_err(|e: psiuu_core::CoreError| e.to_string())?;
        Ok(BankAccount {
            balance: Money::try_from_decimal("balance", self.balance).map_err(|e| e.to_string())?,
            currency,
            id: self.id,
            bank_name: self.bank_name,
            account_number: self.account_number,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SALES_BODY: &str = r#"{
        "sales": { "data": [
            {
                "id": "v1", "data": "2024-03-01T10:00:00Z", "userId": "user_12",
                "packageType": "15_creditos", "valorBruto": 24.9, "storeFee": 3.74,
                "influencerId": "inf-1", "agentId": "agt-1",
                "comissaoInfluencer": 4.98, "comissaoAgent": 1.25,
                "status": "Aprovado", "paymentMethod": "Pix"
            },
            {
                "id": "v2", "data": "2024-03-02", "userId": "user_13",
                "packageType": "8_creditos", "valorBruto": 14.9, "storeFee": 2.24,
                "influencerId": "",
                "status": "Pendente", "paymentMethod": "In-App Purchase"
            }
        ] }
    }"#;

    #[test]
    fn test_parse_sales() {
        let sales = parse_sales(SALES_BODY).unwrap();
        assert_eq!(sales.len(), 2);

        assert_eq!(sales[0].tier, PackageTier::Credits15);
        assert_eq!(sales[0].gross.cents(), 2490);
        assert_eq!(sales[0].agent_commission.cents(), 125);
        assert!(sales[0].is_approved());

        assert_eq!(sales[1].influencer_id, None);
        assert!(sales[1].influencer_commission.is_zero());
        assert_eq!(sales[1].payment_method, PaymentMethod::InAppPurchase);
    }

    #[test]
    fn test_missing_envelope_is_schema_error() {
        let err = parse_sales(r#"{ "data": [] }"#).unwrap_err();
        assert!(err.is_schema_error());

        let err = parse_payouts(r#"{ "items": [] }"#).unwrap_err();
        assert!(err.is_schema_error());

        let err = parse_sales("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Schema { ref endpoint, .. } if endpoint == SALES));
    }

    #[test]
    fn test_bad_values_are_schema_errors() {
        let body = SALES_BODY.replace("\"15_creditos\"", "\"12_creditos\"");
        let err = parse_sales(&body).unwrap_err();
        assert!(err.to_string().contains("record 0"));

        let body = SALES_BODY.replace("\"storeFee\": 3.74", "\"storeFee\": -3.74");
        assert!(parse_sales(&body).unwrap_err().is_schema_error());

        let body = SALES_BODY.replace("\"Aprovado\"", "\"Approved!\"");
        assert!(parse_sales(&body).is_err());
    }

    #[test]
    fn test_parse_payouts() {
        let body = r#"{ "data": [
            {
                "id": "p1", "beneficiaryName": "Ana Souza", "beneficiaryType": "Influencer",
                "amount": 1250.0, "status": "Em Análise",
                "dateCreated": "2024-03-10T00:00:00Z", "dueDate": "2024-03-25",
                "invoiceUrl": "https://files/nf-1.pdf"
            },
            {
                "id": "p2", "beneficiaryId": "agt-9", "beneficiaryName": "Beto",
                "beneficiaryType": "Agent", "amount": 80.5, "status": "Aprovado",
                "dateCreated": "2024-03-10", "dueDate": "2024-03-25"
            }
        ] }"#;

        let payouts = parse_payouts(body).unwrap();
        assert_eq!(payouts[0].status, PayoutStatus::UnderReview);
        assert_eq!(payouts[0].beneficiary_id, "Ana Souza");
        assert_eq!(payouts[0].amount.cents(), 125_000);
        assert_eq!(payouts[0].invoice_ref.as_deref(), Some("https://files/nf-1.pdf"));
        assert_eq!(payouts[1].beneficiary_id, "agt-9");
        assert_eq!(payouts[1].beneficiary_type, BeneficiaryType::Agent);
    }

    #[test]
    fn test_parse_bank_accounts_and_entries() {
        let accounts = parse_bank_accounts(
            r#"[
                { "id": "a1", "bankName": "Inter", "accountNumber": "123", "balance": 1000.0, "currency": "BRL" },
                { "id": "a2", "bankName": "Wise", "accountNumber": "456", "balance": -20.5, "currency": "USD" }
            ]"#,
        )
        .unwrap();
        assert_eq!(accounts[1].currency, Currency::Usd);
        assert_eq!(accounts[1].balance.cents(), -2050);

        let entries = parse_entries(
            r#"{ "data": [
                { "id": "l1", "data": "2024-03-01", "description": "AWS", "parceiro": "Amazon",
                  "valorBruto": 500.0, "valorLiquido": 480.0, "status": "Confirmado", "type": "Despesa" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(entries[0].entry_type, EntryType::Expense);
        assert_eq!(entries[0].net.cents(), 48_000);
    }

    #[test]
    fn test_messaging_stats_to_infra_cost() {
        let now = Utc::now();
        let cost = parse_messaging_stats(
            SMS_STATS,
            r#"{ "data": { "sent_today": 120, "cost_today": 9.6, "avg_cost": 0.08 } }"#,
            InfraChannel::Sms,
            now,
        )
        .unwrap();
        assert_eq!(cost.provider, InfraProvider::Twilio);
        assert_eq!(cost.quantity, 120);
        assert_eq!(cost.total_cost.cents(), 960);

        let err = parse_messaging_stats(
            WHATSAPP_STATS,
            r#"{ "data": { "sent_today": 1, "cost_today": 1.0, "avg_cost": -1 } }"#,
            InfraChannel::WhatsApp,
            now,
        )
        .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_payout_action_segments() {
        let segments: Vec<&str> = payout_action_segments("p1", PAY_ACTION).collect();
        assert_eq!(segments, vec!["finance", "payouts", "p1", "complete"]);

        let segments: Vec<&str> = payout_action_segments("a/b", REJECT_ACTION).collect();
        assert_eq!(segments[2], "a/b");
    }
}
