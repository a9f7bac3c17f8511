//! # Mock Dataset
//!
//! Seeded demo data for when the finance API is unreachable.
//!
//! Everything goes through the real rules: sales are priced by the
//! [`CommissionAllocator`] and payouts are opened from the resulting
//! balances, so the dataset reconciles the same way live data does.
//!
//! ```text
//! agents ──► influencers ──► sales (allocator) ──► payouts (open_eligible_payouts)
//!                                                      │
//!                                                      └─ walked through the lifecycle
//! directory figures (counts, balances) ◄── derived from sales + payouts
//! bank accounts, ledger entries, infra costs: independent
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use psiuu_core::allocator::{CommissionAllocator, SaleRequest};
use psiuu_core::balance::{open_eligible_payouts, BeneficiaryBalance};
use psiuu_core::{
    Agent, BankAccount, CoreResult, Currency, EntryStatus, EntryType, FinanceRules, InfraChannel,
    InfraCost, InfraProvider, Influencer, LedgerEntry, Money, PackageTier, PartnerStatus, Payout,
    PayoutAction, PaymentMethod, Sale, SaleStatus,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FIRST_NAMES: [&str; 10] = [
    "Ana", "Bruno", "Carla", "Diego", "Elisa", "Felipe", "Gabriela", "Heitor", "Isabela", "João",
];
const LAST_NAMES: [&str; 8] = [
    "Souza", "Lima", "Carvalho", "Oliveira", "Pereira", "Costa", "Almeida", "Ribeiro",
];
const AGENT_COUNT: usize = 3;
const INFLUENCER_COUNT: usize = 5;
const SALES_WINDOW_DAYS: i64 = 60;

/// Every collection the dashboard reads.
#[derive(Debug, Clone, Default)]
pub struct MockDataset {
    pub agents: Vec<Agent>,
    pub influencers: Vec<Influencer>,
    pub sales: Vec<Sale>,
    pub payouts: Vec<Payout>,
    pub entries: Vec<LedgerEntry>,
    pub bank_accounts: Vec<BankAccount>,
    pub infra_costs: Vec<InfraCost>,
}

impl MockDataset {
    /// Builds a full dataset. Same seed, same numbers.
    pub fn generate(
        rules: &FinanceRules,
        seed: u64,
        sales_count: usize,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let mut generator = MockGenerator::new(rules.clone(), seed)?;
        let mut agents = generator.agents(AGENT_COUNT);
        let mut influencers = generator.influencers(&agents, INFLUENCER_COUNT, now);
        let sales = generator.sales(&influencers, sales_count, now);
        let payouts = generator.payouts(&sales, &influencers, &agents, now)?;
        fill_directory(&mut agents, &mut influencers, &sales, &payouts);

        Ok(MockDataset {
            entries: generator.ledger_entries(now),
            bank_accounts: generator.bank_accounts(),
            infra_costs: generator.infra_costs(now),
            agents,
            influencers,
            sales,
            payouts,
        })
    }
}

/// Seeded generator for the individual collections.
pub struct MockGenerator {
    allocator: CommissionAllocator,
    rng: StdRng,
}

impl MockGenerator {
    pub fn new(rules: FinanceRules, seed: u64) -> CoreResult<Self> {
        Ok(Self {
            allocator: CommissionAllocator::new(rules)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn name(&mut self) -> String {
        let first = FIRST_NAMES[self.rng.gen_range(0..FIRST_NAMES.len())];
        let last = LAST_NAMES[self.rng.gen_range(0..LAST_NAMES.len())];
        format!("{} {}", first, last)
    }

    fn days_ago(&mut self, now: DateTime<Utc>, max_days: i64) -> DateTime<Utc> {
        now - Duration::days(self.rng.gen_range(0..max_days)) - Duration::minutes(self.rng.gen_range(0..1440))
    }

    pub fn agents(&mut self, count: usize) -> Vec<Agent> {
        (1..=count)
            .map(|i| {
                let name = self.name();
                Agent {
                    id: format!("agt-{}", i),
                    email: format!("{}@psiuu.app", name.to_lowercase().replace(' ', ".")),
                    name,
                    influencers_count: 0,
                    balance_available: Money::zero(),
                    status: PartnerStatus::Active,
                }
            })
            .collect()
    }

    /// Influencers are spread round-robin over the agents; every fourth one
    /// is unmanaged.
    pub fn influencers(&mut self, agents: &[Agent], count: usize, now: DateTime<Utc>) -> Vec<Influencer> {
        (1..=count)
            .map(|i| {
                let name = self.name();
                let handle = name.to_lowercase().replace(' ', "_");
                let agent_id = if i % 4 == 0 || agents.is_empty() {
                    None
                } else {
                    Some(agents[i % agents.len()].id.clone())
                };
                Influencer {
                    id: format!("inf-{}", i),
                    coupon_code: format!("PSIUU{}", i * 10),
                    instagram_handle: format!("@{}", handle),
                    status: if self.rng.gen_bool(0.9) {
                        PartnerStatus::Active
                    } else {
                        PartnerStatus::Inactive
                    },
                    agent_id,
                    total_sales: 0,
                    balance_available: Money::zero(),
                    registered_at: self.days_ago(now, 365),
                    name,
                }
            })
            .collect()
    }

    /// Roughly 70% of sales carry a coupon; 80% are approved.
    pub fn sales(&mut self, influencers: &[Influencer], count: usize, now: DateTime<Utc>) -> Vec<Sale> {
        let mut sales: Vec<Sale> = (0..count)
            .map(|_| {
                let tier = PackageTier::ALL[self.rng.gen_range(0..PackageTier::ALL.len())];
                let method = match self.rng.gen_range(0..3) {
                    0 => PaymentMethod::CreditCard,
                    1 => PaymentMethod::Pix,
                    _ => PaymentMethod::InAppPurchase,
                };
                let status = match self.rng.gen_range(0..10) {
                    0..=7 => SaleStatus::Approved,
                    8 => SaleStatus::Pending,
                    _ => SaleStatus::Reversed,
                };

                let mut request = SaleRequest::new(format!("user_{}", self.rng.gen_range(1..=9999)), tier, method)
                    .with_status(status)
                    .at(self.days_ago(now, SALES_WINDOW_DAYS));
                if !influencers.is_empty() && self.rng.gen_bool(0.7) {
                    let influencer = &influencers[self.rng.gen_range(0..influencers.len())];
                    request = request.referred_by(influencer.id.clone());
                }
                self.allocator.record_sale(request, influencers)
            })
            .collect();

        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sales
    }

    /// Opens a payout for every eligible beneficiary, then spreads them over
    /// the lifecycle so every status shows up.
    pub fn payouts(
        &mut self,
        sales: &[Sale],
        influencers: &[Influencer],
        agents: &[Agent],
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<Payout>> {
        let names: BTreeMap<String, String> = influencers
            .iter()
            .map(|i| (i.id.clone(), i.name.clone()))
            .chain(agents.iter().map(|a| (a.id.clone(), a.name.clone())))
            .collect();
        open_eligible_payouts(sales, &[], &names, self.allocator.rules(), now)
            .into_iter()
            .enumerate()
            .map(|(i, payout)| advance(payout, i % 5))
            .collect()
    }

    pub fn ledger_entries(&mut self, now: DateTime<Utc>) -> Vec<LedgerEntry> {
        const ITEMS: [(&str, &str, EntryType, i64); 5] = [
            ("Servidores AWS", "Amazon", EntryType::Expense, 250_000),
            ("Licença de software", "Google", EntryType::Expense, 45_000),
            ("Contabilidade", "Escritório Contábil", EntryType::Expense, 120_000),
            ("Patrocínio de evento", "Agência Parceira", EntryType::Revenue, 300_000),
            ("Rendimento de aplicação", "Banco Inter", EntryType::Revenue, 18_000),
        ];

        ITEMS
            .iter()
            .enumerate()
            .map(|(i, (description, partner, entry_type, base))| {
                let gross = Money::from_cents(base + self.rng.gen_range(0..10_000));
                let withheld = Money::from_cents(gross.cents() / 50);
                LedgerEntry {
                    id: format!("lan-{}", i + 1),
                    date: self.days_ago(now, 30),
                    account_id: Some("acc-1".to_string()),
                    cost_center_id: None,
                    description: description.to_string(),
                    partner: partner.to_string(),
                    gross,
                    net: gross - withheld,
                    status: if i == 1 { EntryStatus::Pending } else { EntryStatus::Confirmed },
                    entry_type: *entry_type,
                }
            })
            .collect()
    }

    pub fn bank_accounts(&mut self) -> Vec<BankAccount> {
        vec![
            BankAccount {
                id: "acc-1".to_string(),
                bank_name: "Banco Inter".to_string(),
                account_number: "0001-9".to_string(),
                balance: Money::from_cents(self.rng.gen_range(2_000_000..8_000_000)),
                currency: Currency::Brl,
            },
            BankAccount {
                id: "acc-2".to_string(),
                bank_name: "Nubank PJ".to_string(),
                account_number: "0002-7".to_string(),
                balance: Money::from_cents(self.rng.gen_range(500_000..2_000_000)),
                currency: Currency::Brl,
            },
            BankAccount {
                id: "acc-3".to_string(),
                bank_name: "Wise".to_string(),
                account_number: "US-4411".to_string(),
                balance: Money::from_cents(self.rng.gen_range(100_000..500_000)),
                currency: Currency::Usd,
            },
        ]
    }

    pub fn infra_costs(&mut self, now: DateTime<Utc>) -> Vec<InfraCost> {
        let channels = [
            ("sms-today", InfraChannel::Sms, InfraProvider::Twilio, 0.08),
            ("whatsapp-today", InfraChannel::WhatsApp, InfraProvider::Meta, 0.05),
            ("email-today", InfraChannel::Email, InfraProvider::SendGrid, 0.002),
        ];

        channels
            .iter()
            .map(|(id, channel, provider, unit_cost)| {
                let quantity: u64 = self.rng.gen_range(100..5_000);
                let total = (quantity as f64 * unit_cost * 100.0).round() as i64;
                InfraCost {
                    id: id.to_string(),
                    date: now,
                    channel: *channel,
                    provider: *provider,
                    quantity,
                    unit_cost_brl: *unit_cost,
                    total_cost: Money::from_cents(total),
                }
            })
            .collect()
    }
}

/// Rewrites the figures the API would report for each partner so the
/// directory agrees with the generated sales and payouts.
fn fill_directory(agents: &mut [Agent], influencers: &mut [Influencer], sales: &[Sale], payouts: &[Payout]) {
    for influencer in influencers.iter_mut() {
        let referred = sales
            .iter()
            .filter(|s| s.influencer_id.as_deref() == Some(influencer.id.as_str()))
            .count();
        influencer.total_sales = u32::try_from(referred).unwrap_or(u32::MAX);
        influencer.balance_available = BeneficiaryBalance::compute(influencer.as_beneficiary(), sales, payouts).available;
    }

    for agent in agents.iter_mut() {
        let managed = influencers
            .iter()
            .filter(|i| i.agent_id.as_deref() == Some(agent.id.as_str()))
            .count();
        agent.influencers_count = u32::try_from(managed).unwrap_or(u32::MAX);
        agent.balance_available = BeneficiaryBalance::compute(agent.as_beneficiary(), sales, payouts).available;
    }
}

/// Walks a fresh payout forward `steps` times; step 4 means rejected.
fn advance(payout: Payout, steps: usize) -> CoreResult<Payout> {
    let path: Vec<PayoutAction> = match steps {
        0 => vec![],
        1 => vec![submit(&payout)],
        2 => vec![submit(&payout), PayoutAction::Approve],
        3 => vec![submit(&payout), PayoutAction::Approve, PayoutAction::MarkPaid],
        _ => vec![
            submit(&payout),
            PayoutAction::Reject {
                reason: "Nota fiscal com CNPJ divergente".to_string(),
            },
        ],
    };

    path.iter().try_fold(payout, |p, action| p.apply(action))
}

fn submit(payout: &Payout) -> PayoutAction {
    PayoutAction::SubmitInvoice {
        invoice_ref: format!("https://files.psiuu.app/nf/{}.pdf", payout.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psiuu_core::extract::reconcile_extract;
    use psiuu_core::PayoutStatus;

    fn dataset(seed: u64) -> MockDataset {
        MockDataset::generate(&FinanceRules::default(), seed, 200, Utc::now()).unwrap()
    }

    #[test]
    fn test_same_seed_same_numbers() {
        let a = dataset(42);
        let b = dataset(42);

        let gross = |d: &MockDataset| d.sales.iter().map(|s| s.gross).sum::<Money>();
        assert_eq!(gross(&a), gross(&b));
        assert_eq!(a.payouts.len(), b.payouts.len());
        assert_eq!(a.bank_accounts[0].balance, b.bank_accounts[0].balance);
    }

    #[test]
    fn test_sales_follow_rules() {
        let rules = FinanceRules::default();
        let data = dataset(7);
        assert_eq!(data.sales.len(), 200);

        for sale in &data.sales {
            assert_eq!(sale.gross, rules.price_of(sale.tier));
            if sale.influencer_id.is_none() {
                assert!(sale.influencer_commission.is_zero());
                assert!(sale.agent_id.is_none());
            }
        }
        assert!(data.sales.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn test_payouts_reconcile_against_sales() {
        let rules = FinanceRules::default();
        let data = dataset(42);
        assert!(!data.payouts.is_empty());

        for payout in &data.payouts {
            assert!(payout.amount > rules.payout_threshold());
            let extract = reconcile_extract(payout, &data.sales, &data.payouts, &rules).unwrap();
            assert_eq!(extract.total(), payout.amount);
        }
    }

    #[test]
    fn test_advance_covers_lifecycle() {
        let data = dataset(42);
        let template = data.payouts[0].clone();
        let fresh = Payout {
            status: PayoutStatus::AwaitingInvoice,
            invoice_ref: None,
            rejection_reason: None,
            ..template
        };

        assert_eq!(advance(fresh.clone(), 0).unwrap().status, PayoutStatus::AwaitingInvoice);
        assert_eq!(advance(fresh.clone(), 2).unwrap().status, PayoutStatus::Approved);
        assert_eq!(advance(fresh.clone(), 3).unwrap().status, PayoutStatus::Paid);
        let rejected = advance(fresh, 4).unwrap();
        assert_eq!(rejected.status, PayoutStatus::Rejected);
        assert!(rejected.rejection_reason.is_some());
    }

    #[test]
    fn test_advance_reports_illegal_walk() {
        let data = dataset(42);
        let paid = Payout {
            status: PayoutStatus::Paid,
            ..data.payouts[0].clone()
        };

        // A paid payout cannot take an invoice again.
        assert!(advance(paid, 1).is_err());
    }

    #[test]
    fn test_directory_matches_generated_data() {
        let data = dataset(42);

        for influencer in &data.influencers {
            let referred = data
                .sales
                .iter()
                .filter(|s| s.influencer_id.as_deref() == Some(influencer.id.as_str()))
                .count();
            assert_eq!(influencer.total_sales as usize, referred);
            let balance = BeneficiaryBalance::compute(influencer.as_beneficiary(), &data.sales, &data.payouts);
            assert_eq!(influencer.balance_available, balance.available);
        }
        assert!(data.influencers.iter().any(|i| i.total_sales > 0));

        for agent in &data.agents {
            let managed = data
                .influencers
                .iter()
                .filter(|i| i.agent_id.as_deref() == Some(agent.id.as_str()))
                .count();
            assert_eq!(agent.influencers_count as usize, managed);
            let balance = BeneficiaryBalance::compute(agent.as_beneficiary(), &data.sales, &data.payouts);
            assert_eq!(agent.balance_available, balance.available);
        }
        let managed_total: u32 = data.agents.iter().map(|a| a.influencers_count).sum();
        assert_eq!(
            managed_total as usize,
            data.influencers.iter().filter(|i| i.agent_id.is_some()).count()
        );
    }
}
