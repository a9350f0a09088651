use crate::event::BudgetAlertEvent;

/// The fraction of a budget at which spend is considered to exceed it.
///
/// `Threshold::FULL` is the hard cap: spend equal to or above the budget.
/// The comparison is inclusive and has no hysteresis, so a stale or
/// redelivered alert for a breach that was already handled will evaluate as
/// exceeded again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub exceeded: bool,
}

impl Threshold {
    pub const FULL: Threshold = Threshold(1.0);

    pub fn new(fraction: f64) -> Result<Self, String> {
        if !fraction.is_finite() || fraction <= 0.0 {
            return Err(format!(
                "threshold must be a positive fraction of the budget (got {fraction})"
            ));
        }
        Ok(Threshold(fraction))
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }

    pub fn evaluate(&self, event: &BudgetAlertEvent) -> Evaluation {
        Evaluation {
            exceeded: event.cost_amount >= event.budget_amount * self.0,
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::FULL
    }
}

impl std::str::FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fraction = s
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid threshold {s:?}: {err}"))?;
        Self::new(fraction)
    }
}

/// Evaluate `event` against the hard cap.
pub fn evaluate(event: &BudgetAlertEvent) -> Evaluation {
    Threshold::FULL.evaluate(event)
}

#[cfg(test)]
mod test {
    use super::*;

    fn event(budget_amount: f64, cost_amount: f64) -> BudgetAlertEvent {
        BudgetAlertEvent {
            budget_amount,
            cost_amount,
            currency_code: "USD".to_string(),
            budget_display_name: None,
            cost_interval_start: None,
            alert_threshold_exceeded: None,
        }
    }

    #[test]
    fn test_hard_cap_is_inclusive() {
        assert!(!evaluate(&event(100.0, 42.0)).exceeded);
        assert!(!evaluate(&event(100.0, 99.99)).exceeded);
        assert!(evaluate(&event(100.0, 100.0)).exceeded);
        assert!(evaluate(&event(100.0, 120.0)).exceeded);
        // A zero budget is exhausted immediately.
        assert!(evaluate(&event(0.0, 0.0)).exceeded);
    }

    #[test]
    fn test_fractional_threshold() {
        let threshold: Threshold = "0.8".parse().unwrap();
        assert!(!threshold.evaluate(&event(100.0, 79.0)).exceeded);
        assert!(threshold.evaluate(&event(100.0, 80.0)).exceeded);

        let threshold = Threshold::new(1.5).unwrap();
        assert!(!threshold.evaluate(&event(100.0, 120.0)).exceeded);
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!("1.0".parse::<Threshold>().unwrap(), Threshold::FULL);
        assert_eq!(Threshold::default(), Threshold::FULL);

        for bad in ["0", "-0.5", "NaN", "inf", "lots"] {
            assert!(bad.parse::<Threshold>().is_err(), "{bad}");
        }
    }
}
