//! Batch plans
//!
//! A plan is a validated, ordered channel list plus its encoded request. Plans
//! are built once at configuration time so the polling loop never looks up an
//! identifier per cycle.

use std::fmt;

use serde::Serialize;

use crate::codec::encode_channels;
use crate::error::{ConvError, ConvResult};
use crate::registry::{resolve_all, ChannelId};

/// Largest response (in bytes) an adapter returns in a single frame
pub const SINGLE_FRAME_BUDGET: usize = 7;

/// Response size of a batch: one header byte plus code + data per channel
pub fn byte_budget(channels: &[ChannelId]) -> usize {
    1 + channels
        .iter()
        .map(|c| 1 + c.descriptor().byte_width as usize)
        .sum::<usize>()
}

/// Advisory raised when a plan's response will not fit in one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetWarning {
    pub channels: Vec<ChannelId>,
    pub budget: usize,
    pub limit: usize,
}

impl fmt::Display for BudgetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.as_str()).collect();
        write!(
            f,
            "batch [{}] needs {} bytes, single frame holds {}",
            names.join(", "),
            self.budget,
            self.limit
        )
    }
}

/// Ordered, non-empty list of channels requested together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    channels: Vec<ChannelId>,
    request: String,
    budget: usize,
}

impl BatchPlan {
    /// Build a plan from already-resolved channels
    pub fn new(channels: Vec<ChannelId>) -> ConvResult<Self> {
        if channels.is_empty() {
            return Err(ConvError::EmptyBatch);
        }
        let request = encode_channels(&channels);
        let budget = byte_budget(&channels);
        Ok(Self {
            channels,
            request,
            budget,
        })
    }

    /// Build a plan from identifiers, rejecting unknown ones
    pub fn from_identifiers<S: AsRef<str>>(identifiers: &[S]) -> ConvResult<Self> {
        Self::new(resolve_all(identifiers)?)
    }

    /// Greedily chunk `channels` into plans that each fit one frame
    ///
    /// Order is preserved. A single channel is always accepted even if it
    /// alone would exceed the budget.
    pub fn split_within_budget(channels: &[ChannelId]) -> ConvResult<Vec<Self>> {
        if channels.is_empty() {
            return Err(ConvError::EmptyBatch);
        }

        let mut plans = Vec::new();
        let mut current: Vec<ChannelId> = Vec::new();
        for &channel in channels {
            current.push(channel);
            if current.len() > 1 && byte_budget(&current) > SINGLE_FRAME_BUDGET {
                current.pop();
                plans.push(Self::new(std::mem::take(&mut current))?);
                current.push(channel);
            }
        }
        plans.push(Self::new(current)?);
        Ok(plans)
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Mode 01 request string, e.g. `010C0B`
    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn byte_budget(&self) -> usize {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Advisory when the response would spill into multiple frames
    pub fn budget_warning(&self) -> Option<BudgetWarning> {
        (self.budget > SINGLE_FRAME_BUDGET).then(|| BudgetWarning {
            channels: self.channels.clone(),
            budget: self.budget,
            limit: SINGLE_FRAME_BUDGET,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_budget_formula() {
        // 1 + (1+2) + (1+1)
        assert_eq!(byte_budget(&[ChannelId::Rpm, ChannelId::Boost]), 6);
        assert_eq!(byte_budget(&[ChannelId::Timing]), 3);
        assert_eq!(byte_budget(&[]), 1);
    }

    #[test]
    fn test_plan_request_and_budget() {
        let plan = BatchPlan::from_identifiers(&["RPM", "BOOST"]).unwrap();
        assert_eq!(plan.request(), "010C0B");
        assert_eq!(plan.byte_budget(), 6);
        assert_eq!(plan.budget_warning(), None);
    }

    #[test]
    fn test_budget_warning_above_limit() {
        let plan = BatchPlan::new(vec![ChannelId::Rpm, ChannelId::Boost, ChannelId::Timing]).unwrap();
        assert_eq!(plan.byte_budget(), 8);
        let warning = plan.budget_warning().unwrap();
        assert_eq!(warning.budget, 8);
        assert_eq!(warning.limit, SINGLE_FRAME_BUDGET);
        assert!(warning.to_string().contains("RPM, BOOST, TIMING"));
    }

    #[test]
    fn test_budget_exactly_at_limit_is_fine() {
        let plan = BatchPlan::new(vec![ChannelId::Boost, ChannelId::Timing, ChannelId::Throttle])
            .unwrap();
        assert_eq!(plan.byte_budget(), 7);
        assert!(plan.budget_warning().is_none());
    }

    #[test]
    fn test_empty_and_invalid() {
        assert_eq!(BatchPlan::new(vec![]), Err(ConvError::EmptyBatch));
        let empty: [&str; 0] = [];
        assert_eq!(BatchPlan::from_identifiers(&empty), Err(ConvError::EmptyBatch));
        assert_eq!(
            BatchPlan::from_identifiers(&["RPM", "FLUX"]),
            Err(ConvError::InvalidChannel("FLUX".to_string()))
        );
    }

    #[test]
    fn test_split_preserves_order_and_budget() {
        let fast = [
            ChannelId::Rpm,
            ChannelId::Boost,
            ChannelId::Timing,
            ChannelId::Throttle,
            ChannelId::Stft,
        ];
        let plans = BatchPlan::split_within_budget(&fast).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].channels(), &[ChannelId::Rpm, ChannelId::Boost]);
        assert_eq!(
            plans[1].channels(),
            &[ChannelId::Timing, ChannelId::Throttle, ChannelId::Stft]
        );

        let flattened: Vec<ChannelId> = plans.iter().flat_map(|p| p.channels().to_vec()).collect();
        assert_eq!(flattened, fast.to_vec());
        assert!(plans.iter().all(|p| p.budget_warning().is_none()));
    }

    #[test]
    fn test_split_single_channel() {
        let plans = BatchPlan::split_within_budget(&[ChannelId::Afr]).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].request(), "0144");
        assert!(BatchPlan::split_within_budget(&[]).is_err());
    }
}
