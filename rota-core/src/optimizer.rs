//! Multi-skill assignment optimizer.
//!
//! Assigns operator hours to skill demands under one of four objectives.
//! The priority mode is the default and fully deterministic: mono-skill
//! operators first, then primaries capped by the load fraction, then
//! qualified secondaries, then overflow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{WfmError, WfmResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorProfile {
    pub operator_id: String,
    pub primary_skill: String,
    pub secondary_skills: Vec<String>,
    /// Proficiency 1-5 per skill the operator can work.
    pub proficiency: BTreeMap<String, u8>,
    pub availability_hours: f64,
    pub cost_per_hour: f64,
}

impl OperatorProfile {
    pub fn new(
        operator_id: impl Into<String>,
        primary_skill: impl Into<String>,
        availability_hours: f64,
    ) -> Self {
        let primary = primary_skill.into();
        let mut proficiency = BTreeMap::new();
        proficiency.insert(primary.clone(), 3);
        Self {
            operator_id: operator_id.into(),
            primary_skill: primary,
            secondary_skills: Vec::new(),
            proficiency,
            availability_hours,
            cost_per_hour: 25.0,
        }
    }

    pub fn with_primary_proficiency(mut self, level: u8) -> Self {
        self.proficiency.insert(self.primary_skill.clone(), level);
        self
    }

    pub fn with_secondary(mut self, skill: impl Into<String>, level: u8) -> Self {
        let skill = skill.into();
        self.proficiency.insert(skill.clone(), level);
        self.secondary_skills.push(skill);
        self
    }

    pub fn with_cost(mut self, cost_per_hour: f64) -> Self {
        self.cost_per_hour = cost_per_hour;
        self
    }

    pub fn is_mono_skill(&self) -> bool {
        self.secondary_skills.is_empty()
    }

    pub fn proficiency_for(&self, skill: &str) -> u8 {
        self.proficiency.get(skill).copied().unwrap_or(1)
    }

    pub fn knows(&self, skill: &str) -> bool {
        self.primary_skill == skill || self.secondary_skills.iter().any(|s| s == skill)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDemand {
    pub skill: String,
    pub required_hours: f64,
    pub min_proficiency: u8,
}

impl SkillDemand {
    pub fn new(skill: impl Into<String>, required_hours: f64, min_proficiency: u8) -> Self {
        Self {
            skill: skill.into(),
            required_hours,
            min_proficiency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PriorityBased,
    LoadBalanced,
    CostMinimizing,
    SkillDevelopment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub operator_id: String,
    pub skill: String,
    pub hours: f64,
    pub proficiency: u8,
    /// Priority tier the assignment was made in (1-4).
    pub tier: u8,
    pub overflow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub strategy: Strategy,
    pub assignments: Vec<Assignment>,
    pub total_cost: f64,
    /// Percent of each skill's demand covered, capped at 100.
    pub skill_coverage: BTreeMap<String, f64>,
    /// Percent of each operator's availability assigned.
    pub operator_utilization: BTreeMap<String, f64>,
    pub unmet_demand: BTreeMap<String, f64>,
    /// 0.4 coverage + 0.3 utilization + 0.3 normalized proficiency.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProficiencyViolation {
    pub operator_id: String,
    pub skill: String,
    pub proficiency: u8,
    pub required: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSummary {
    pub total_assignments: usize,
    pub operators_assigned: usize,
    pub skills_covered: usize,
    pub total_hours_assigned: f64,
    pub assignments_by_tier: BTreeMap<u8, usize>,
    pub overflow_assignments: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Fraction of a multi-skill operator's availability reserved for the
    /// primary skill in priority mode.
    pub primary_load_fraction: f64,
    /// Utilization ceiling for the load-balanced objective.
    pub target_utilization_cap: f64,
    /// Fraction of a developing operator's time assignable as practice.
    pub development_reserve_fraction: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            primary_load_fraction: 0.70,
            target_utilization_cap: 0.85,
            development_reserve_fraction: 0.20,
        }
    }
}

#[derive(Debug)]
pub struct MultiSkillOptimizer {
    operators: Vec<OperatorProfile>,
    demands: Vec<SkillDemand>,
    settings: OptimizerSettings,
}

impl MultiSkillOptimizer {
    pub fn new(
        mut operators: Vec<OperatorProfile>,
        mut demands: Vec<SkillDemand>,
        settings: OptimizerSettings,
    ) -> WfmResult<Self> {
        for op in &operators {
            if op.availability_hours < 0.0 {
                return Err(WfmError::Validation(format!(
                    "operator {} has negative availability",
                    op.operator_id
                )));
            }
        }
        for d in &demands {
            if d.required_hours < 0.0 {
                return Err(WfmError::Validation(format!(
                    "demand for {} is negative",
                    d.skill
                )));
            }
        }
        // Canonical order keeps every mode deterministic.
        operators.sort_by(|a, b| a.operator_id.cmp(&b.operator_id));
        demands.sort_by(|a, b| a.skill.cmp(&b.skill));
        Ok(Self {
            operators,
            demands,
            settings,
        })
    }

    pub fn optimize(&self, strategy: Strategy) -> OptimizationResult {
        match strategy {
            Strategy::PriorityBased => self.priority_based(),
            Strategy::LoadBalanced => self.load_balanced(),
            Strategy::CostMinimizing => self.cost_minimizing(),
            Strategy::SkillDevelopment => self.skill_development(),
        }
    }

    fn priority_based(&self) -> OptimizationResult {
        let mut state = SolveState::new(&self.operators, &self.demands);

        // Tier 1: mono-skill operators onto their sole skill.
        for op in self.operators.iter().filter(|o| o.is_mono_skill()) {
            state.assign_up_to(op, &op.primary_skill, f64::INFINITY, 1, false);
        }

        // Tier 2: multi-skill primaries, capped by the load fraction,
        // strongest primary proficiency first.
        let mut multi: Vec<&OperatorProfile> =
            self.operators.iter().filter(|o| !o.is_mono_skill()).collect();
        multi.sort_by(|a, b| {
            b.proficiency_for(&b.primary_skill)
                .cmp(&a.proficiency_for(&a.primary_skill))
                .then_with(|| a.operator_id.cmp(&b.operator_id))
        });
        for op in &multi {
            let cap = op.availability_hours * self.settings.primary_load_fraction;
            state.assign_up_to(op, &op.primary_skill, cap, 2, false);
        }

        // Tier 3: qualified secondaries.
        for op in &multi {
            for skill in &op.secondary_skills {
                let Some(demand) = self.demands.iter().find(|d| &d.skill == skill) else {
                    continue;
                };
                if op.proficiency_for(skill) >= demand.min_proficiency {
                    state.assign_up_to(op, skill, f64::INFINITY, 3, false);
                }
            }
        }

        // Tier 4: overflow, proficiency no longer gates.
        for demand in &self.demands {
            if state.remaining(&demand.skill) <= 0.0 {
                continue;
            }
            for op in &self.operators {
                if op.knows(&demand.skill) {
                    state.assign_up_to(op, &demand.skill, f64::INFINITY, 4, true);
                }
            }
        }

        state.finish(Strategy::PriorityBased, &self.operators, &self.demands)
    }

    fn load_balanced(&self) -> OptimizationResult {
        let total_demand: f64 = self.demands.iter().map(|d| d.required_hours).sum();
        let total_capacity: f64 = self.operators.iter().map(|o| o.availability_hours).sum();
        let target = if total_capacity > 0.0 {
            (total_demand / total_capacity).min(self.settings.target_utilization_cap)
        } else {
            self.settings.target_utilization_cap
        };

        let mut state = SolveState::new(&self.operators, &self.demands);

        // Hour-by-hour, give the next increment to whoever lands closest to
        // the target utilization.
        loop {
            let mut best: Option<(usize, &str, f64)> = None;
            for (i, op) in self.operators.iter().enumerate() {
                if op.availability_hours <= 0.0 {
                    continue;
                }
                let assigned = state.operator_hours(&op.operator_id);
                if assigned / op.availability_hours >= target {
                    continue;
                }
                for demand in &self.demands {
                    if state.remaining(&demand.skill) <= 0.0
                        || !op.knows(&demand.skill)
                        || op.proficiency_for(&demand.skill) < demand.min_proficiency
                    {
                        continue;
                    }
                    let step = state
                        .remaining(&demand.skill)
                        .min(op.availability_hours - assigned)
                        .min(1.0);
                    if step <= 0.0 {
                        continue;
                    }
                    let diff = ((assigned + step) / op.availability_hours - target).abs();
                    if best.is_none_or(|(_, _, d)| diff < d) {
                        best = Some((i, demand.skill.as_str(), diff));
                    }
                }
            }
            let Some((op_index, skill, _)) = best else { break };
            let op = &self.operators[op_index];
            let skill = skill.to_string();
            let assigned = state.operator_hours(&op.operator_id);
            let step = state
                .remaining(&skill)
                .min(op.availability_hours - assigned)
                .min(1.0);
            state.assign(op, &skill, step, 2, false);
        }

        state.finish(Strategy::LoadBalanced, &self.operators, &self.demands)
    }

    /// Transportation-style least-effective-cost allocation. Cells are
    /// ordered by cost/proficiency; residual unmet demand marks the solve
    /// infeasible and falls back to priority assignment.
    fn cost_minimizing(&self) -> OptimizationResult {
        let mut cells: Vec<(usize, usize, f64)> = Vec::new();
        for (i, op) in self.operators.iter().enumerate() {
            for (j, demand) in self.demands.iter().enumerate() {
                if op.knows(&demand.skill) {
                    let effective =
                        op.cost_per_hour / (op.proficiency_for(&demand.skill) as f64 / 5.0);
                    cells.push((i, j, effective));
                }
            }
        }
        cells.sort_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut state = SolveState::new(&self.operators, &self.demands);
        for (i, j, _) in cells {
            let op = &self.operators[i];
            let skill = self.demands[j].skill.clone();
            state.assign_up_to(op, &skill, f64::INFINITY, 2, false);
        }

        let infeasible = self.demands.iter().any(|d| state.remaining(&d.skill) > 1e-9);
        if infeasible {
            return self.priority_based();
        }
        state.finish(Strategy::CostMinimizing, &self.operators, &self.demands)
    }

    fn skill_development(&self) -> OptimizationResult {
        let mut state = SolveState::new(&self.operators, &self.demands);

        // Cover at least 70% of each demand with proficient operators.
        for demand in &self.demands {
            let mut proficient_target = demand.required_hours * 0.7;
            for op in &self.operators {
                if proficient_target <= 0.0 {
                    break;
                }
                if op.knows(&demand.skill)
                    && op.proficiency_for(&demand.skill) >= demand.min_proficiency
                {
                    let given = state.assign_up_to(op, &demand.skill, proficient_target, 1, false);
                    proficient_target -= given;
                }
            }
        }

        // Reserve a slice of developing operators for practice hours.
        for demand in &self.demands {
            if state.remaining(&demand.skill) <= 0.0 {
                continue;
            }
            for op in &self.operators {
                let level = op.proficiency_for(&demand.skill);
                let developing = op.secondary_skills.iter().any(|s| s == &demand.skill)
                    && level < demand.min_proficiency
                    && level * 2 >= demand.min_proficiency;
                if developing {
                    let reserve =
                        op.availability_hours * self.settings.development_reserve_fraction;
                    state.assign_up_to(op, &demand.skill, reserve, 3, false);
                }
            }
        }

        // Fill what is left with anyone qualified.
        for demand in &self.demands {
            if state.remaining(&demand.skill) <= 0.0 {
                continue;
            }
            for op in &self.operators {
                if op.knows(&demand.skill)
                    && op.proficiency_for(&demand.skill) >= demand.min_proficiency
                {
                    state.assign_up_to(op, &demand.skill, f64::INFINITY, 2, false);
                }
            }
        }

        state.finish(Strategy::SkillDevelopment, &self.operators, &self.demands)
    }
}

/// Check assignments against each skill's minimum proficiency.
pub fn validate_proficiency(
    result: &OptimizationResult,
    demands: &[SkillDemand],
) -> Vec<ProficiencyViolation> {
    let mut out = Vec::new();
    for a in &result.assignments {
        let Some(demand) = demands.iter().find(|d| d.skill == a.skill) else {
            continue;
        };
        if a.proficiency < demand.min_proficiency {
            out.push(ProficiencyViolation {
                operator_id: a.operator_id.clone(),
                skill: a.skill.clone(),
                proficiency: a.proficiency,
                required: demand.min_proficiency,
            });
        }
    }
    out
}

pub fn assignment_summary(result: &OptimizationResult) -> AssignmentSummary {
    let mut summary = AssignmentSummary {
        total_assignments: result.assignments.len(),
        ..Default::default()
    };
    let mut operators = std::collections::BTreeSet::new();
    let mut skills = std::collections::BTreeSet::new();
    for a in &result.assignments {
        operators.insert(a.operator_id.as_str());
        skills.insert(a.skill.as_str());
        summary.total_hours_assigned += a.hours;
        *summary.assignments_by_tier.entry(a.tier).or_insert(0) += 1;
        if a.overflow {
            summary.overflow_assignments += 1;
        }
    }
    summary.operators_assigned = operators.len();
    summary.skills_covered = skills.len();
    summary
}

// ---------------------------------------------------------------------------

struct SolveState {
    remaining_demand: BTreeMap<String, f64>,
    available: BTreeMap<String, f64>,
    assignments: Vec<Assignment>,
}

impl SolveState {
    fn new(operators: &[OperatorProfile], demands: &[SkillDemand]) -> Self {
        Self {
            remaining_demand: demands
                .iter()
                .map(|d| (d.skill.clone(), d.required_hours))
                .collect(),
            available: operators
                .iter()
                .map(|o| (o.operator_id.clone(), o.availability_hours))
                .collect(),
            assignments: Vec::new(),
        }
    }

    fn remaining(&self, skill: &str) -> f64 {
        self.remaining_demand.get(skill).copied().unwrap_or(0.0)
    }

    fn operator_hours(&self, operator_id: &str) -> f64 {
        self.assignments
            .iter()
            .filter(|a| a.operator_id == operator_id)
            .map(|a| a.hours)
            .sum()
    }

    /// Assign up to `cap` hours, bounded by demand and availability.
    /// Returns the hours actually assigned.
    fn assign_up_to(
        &mut self,
        op: &OperatorProfile,
        skill: &str,
        cap: f64,
        tier: u8,
        overflow: bool,
    ) -> f64 {
        let hours = self
            .remaining(skill)
            .min(self.available.get(&op.operator_id).copied().unwrap_or(0.0))
            .min(cap);
        if hours <= 0.0 {
            return 0.0;
        }
        self.assign(op, skill, hours, tier, overflow);
        hours
    }

    fn assign(&mut self, op: &OperatorProfile, skill: &str, hours: f64, tier: u8, overflow: bool) {
        *self.remaining_demand.entry(skill.to_string()).or_insert(0.0) -= hours;
        *self.available.entry(op.operator_id.clone()).or_insert(0.0) -= hours;

        // Merge into an existing line for the same (operator, skill, tier).
        if let Some(existing) = self
            .assignments
            .iter_mut()
            .find(|a| a.operator_id == op.operator_id && a.skill == skill && a.tier == tier)
        {
            existing.hours += hours;
            return;
        }
        self.assignments.push(Assignment {
            operator_id: op.operator_id.clone(),
            skill: skill.to_string(),
            hours,
            proficiency: op.proficiency_for(skill),
            tier,
            overflow,
        });
    }

    fn finish(
        self,
        strategy: Strategy,
        operators: &[OperatorProfile],
        demands: &[SkillDemand],
    ) -> OptimizationResult {
        let cost_of = |operator_id: &str| {
            operators
                .iter()
                .find(|o| o.operator_id == operator_id)
                .map_or(0.0, |o| o.cost_per_hour)
        };
        let total_cost: f64 = self
            .assignments
            .iter()
            .map(|a| a.hours * cost_of(&a.operator_id))
            .sum();

        let mut skill_coverage = BTreeMap::new();
        let mut unmet_demand = BTreeMap::new();
        for d in demands {
            let assigned: f64 = self
                .assignments
                .iter()
                .filter(|a| a.skill == d.skill)
                .map(|a| a.hours)
                .sum();
            let coverage = if d.required_hours > 0.0 {
                (assigned / d.required_hours * 100.0).min(100.0)
            } else {
                100.0
            };
            skill_coverage.insert(d.skill.clone(), coverage);
            unmet_demand.insert(d.skill.clone(), (d.required_hours - assigned).max(0.0));
        }

        let mut operator_utilization = BTreeMap::new();
        for op in operators {
            let assigned = self.operator_hours(&op.operator_id);
            let utilization = if op.availability_hours > 0.0 {
                assigned / op.availability_hours * 100.0
            } else {
                0.0
            };
            operator_utilization.insert(op.operator_id.clone(), utilization);
        }

        let avg = |m: &BTreeMap<String, f64>| {
            if m.is_empty() {
                0.0
            } else {
                m.values().sum::<f64>() / m.len() as f64
            }
        };
        let avg_proficiency = if self.assignments.is_empty() {
            0.0
        } else {
            self.assignments
                .iter()
                .map(|a| a.proficiency as f64 / 5.0)
                .sum::<f64>()
                / self.assignments.len() as f64
        };
        let score = avg(&skill_coverage) * 0.4
            + avg(&operator_utilization) * 0.3
            + avg_proficiency * 100.0 * 0.3;

        OptimizationResult {
            strategy,
            assignments: self.assignments,
            total_cost,
            skill_coverage,
            operator_utilization,
            unmet_demand,
            score,
        }
    }
}
