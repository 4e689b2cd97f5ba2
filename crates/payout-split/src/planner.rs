//! Payout planning.
//!
//! ```text
//! amount_i = floor(base_unit * percentage_i)
//! sum(percentage_i) <= 1  =>  sum(amount_i) <= base_unit
//! ```
//!
//! The plan is total over the recipient table: zero-amount entries are
//! kept, in table order. Dropping zero outputs is the transaction
//! assembler's decision.

use payout_types::{PayoutConfig, PayoutOutput, Percentage};

use crate::{PlanError, Result};

/// Validate the distribution table of a configuration.
///
/// # Errors
///
/// - [`PlanError::EntryOutOfRange`] if any entry exceeds one
/// - [`PlanError::TotalExceedsOne`] if the entries sum above one
/// - [`PlanError::Overflow`] if the sum does not fit in 64 bits
pub fn validate_distribution(config: &PayoutConfig) -> Result<Percentage> {
    for (index, recipient) in config.recipients.iter().enumerate() {
        let percentage = recipient.reward_distribution.percentage;
        if !percentage.is_unit_bounded() {
            return Err(PlanError::EntryOutOfRange {
                index,
                percentage: percentage.to_string(),
            });
        }
    }

    // Entries are at most one each; only an absurdly long table overflows.
    let total = config.total_percentage().ok_or(PlanError::Overflow)?;
    if !total.is_unit_bounded() {
        return Err(PlanError::TotalExceedsOne {
            total: total.to_string(),
        });
    }
    Ok(total)
}

/// Plan per-recipient output amounts for one payout.
///
/// # Arguments
///
/// * `config` - The configuration snapshot for this cycle
/// * `base_unit` - The amount split across recipients, in base units
///
/// # Errors
///
/// Any error from [`validate_distribution`]. The table is re-validated on
/// every call even if it was checked when it was saved.
pub fn plan(config: &PayoutConfig, base_unit: u64) -> Result<Vec<PayoutOutput>> {
    let total = validate_distribution(config)?;

    let outputs = config
        .recipients
        .iter()
        .map(|r| {
            let amount = r
                .reward_distribution
                .percentage
                .apply_floor(base_unit)
                .ok_or(PlanError::Overflow)?;
            Ok(PayoutOutput {
                address: r.reward_distribution.address.clone(),
                amount,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        base_unit,
        recipients = outputs.len(),
        total_percentage = %total,
        planned = outputs.iter().map(|o| o.amount).sum::<u64>(),
        "payout planned"
    );

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use payout_types::{Address, Decimal, RecipientEntry, RewardDistribution};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn entry(addr: &str, ppb: u64) -> RecipientEntry {
        RecipientEntry {
            source_address: Address::new(format!("src-{addr}")),
            observed_amount: Decimal::default(),
            is_valid: true,
            reward_distribution: RewardDistribution {
                address: Address::new(addr),
                percentage: Percentage::from_ppb(ppb),
            },
        }
    }

    fn config(entries: Vec<RecipientEntry>) -> PayoutConfig {
        PayoutConfig {
            payout_address: Address::new("fund"),
            proof: String::new(),
            recipients: entries,
        }
    }

    fn amounts(outputs: &[PayoutOutput]) -> Vec<u64> {
        outputs.iter().map(|o| o.amount).collect()
    }

    #[test]
    fn test_fifty_thirty_twenty() {
        let cfg = config(vec![
            entry("a", 500_000_000),
            entry("b", 300_000_000),
            entry("c", 200_000_000),
        ]);
        let outputs = plan(&cfg, 1_000_000).expect("plan");
        assert_eq!(amounts(&outputs), vec![500_000, 300_000, 200_000]);
        assert_eq!(outputs[0].address, Address::new("a"));
        assert_eq!(outputs[2].address, Address::new("c"));
    }

    #[test]
    fn test_empty_table_is_valid() {
        let outputs = plan(&config(vec![]), 1_000_000).expect("plan");
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_total_above_one_rejected() {
        let cfg = config(vec![entry("a", 600_000_000), entry("b", 400_000_001)]);
        let err = plan(&cfg, 1_000).expect_err("should reject");
        assert!(err.is_invalid_distribution());
        assert!(matches!(err, PlanError::TotalExceedsOne { .. }));
    }

    #[test]
    fn test_entry_above_one_rejected() {
        let cfg = config(vec![entry("a", 1_500_000_000)]);
        let err = plan(&cfg, 1_000).expect_err("should reject");
        assert_eq!(
            err,
            PlanError::EntryOutOfRange {
                index: 0,
                percentage: "1.5".to_string(),
            }
        );
    }

    #[test]
    fn test_exactly_one_accepted() {
        let cfg = config(vec![entry("a", 250_000_000), entry("b", 750_000_000)]);
        let outputs = plan(&cfg, 1_001).expect("plan");
        assert_eq!(amounts(&outputs), vec![250, 750]);
    }

    #[test]
    fn test_zero_amounts_kept_in_order() {
        let cfg = config(vec![entry("a", 1), entry("b", 500_000_000), entry("c", 0)]);
        let outputs = plan(&cfg, 10).expect("plan");
        assert_eq!(amounts(&outputs), vec![0, 5, 0]);
        assert_eq!(outputs.len(), 3);
    }

    #[test]
    fn test_floor_never_overpays_thirds() {
        let cfg = config(vec![
            entry("a", 333_333_333),
            entry("b", 333_333_333),
            entry("c", 333_333_334),
        ]);
        let outputs = plan(&cfg, 100).expect("plan");
        assert_eq!(amounts(&outputs), vec![33, 33, 33]);
    }

    #[test]
    fn test_randomized_no_overpayment() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let n = rng.gen_range(0..10usize);
            let mut remaining = Percentage::ONE.ppb();
            let entries: Vec<RecipientEntry> = (0..n)
                .map(|i| {
                    let ppb = rng.gen_range(0..=remaining);
                    remaining -= ppb;
                    entry(&format!("r{i}"), ppb)
                })
                .collect();
            let cfg = config(entries);
            let base_unit = rng.gen_range(0..=u64::MAX / 2);
            let outputs = plan(&cfg, base_unit).expect("valid table");
            assert_eq!(outputs.len(), n);
            let sum: u128 = outputs.iter().map(|o| u128::from(o.amount)).sum();
            assert!(sum <= u128::from(base_unit));
        }
    }

    #[test]
    fn test_randomized_overfull_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let n = rng.gen_range(1..10usize);
            let mut entries: Vec<RecipientEntry> = (0..n)
                .map(|i| entry(&format!("r{i}"), rng.gen_range(0..=Percentage::ONE.ppb() / n as u64)))
                .collect();
            let total: u64 = entries
                .iter()
                .map(|e| e.reward_distribution.percentage.ppb())
                .sum();
            // push the table just over one
            let bump = Percentage::ONE.ppb() - total + 1;
            let last = entries.len() - 1;
            let current = entries[last].reward_distribution.percentage.ppb();
            entries[last].reward_distribution.percentage = Percentage::from_ppb(current + bump);
            let err = plan(&config(entries), 1_000).expect_err("overfull");
            assert!(err.is_invalid_distribution());
        }
    }
}
