//! Employee model: identity, capability set and scheduling constraints.

use serde::{Deserialize, Serialize};

use crate::error::{WfmError, WfmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Intern,
    Consultant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeCategory {
    Adult,
    Minor,
}

/// One skill an employee can work, with proficiency 1-5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGrade {
    pub skill_id: String,
    pub proficiency: u8,
    pub certified: bool,
}

impl SkillGrade {
    pub fn new(skill_id: impl Into<String>, proficiency: u8) -> Self {
        Self {
            skill_id: skill_id.into(),
            proficiency,
            certified: false,
        }
    }
}

/// Per-employee scheduling constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeConstraints {
    pub max_daily_hours: f64,
    pub max_weekly_hours: f64,
    pub night_work_allowed: bool,
    pub weekend_work_allowed: bool,
    pub overtime_allowed: bool,
    /// Productivity factor in (0, 1].
    pub work_rate: f64,
}

impl Default for EmployeeConstraints {
    fn default() -> Self {
        Self {
            max_daily_hours: 8.0,
            max_weekly_hours: 40.0,
            night_work_allowed: true,
            weekend_work_allowed: true,
            overtime_allowed: false,
            work_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub display_name: String,
    pub employee_number: String,
    pub employment_type: EmploymentType,
    pub age_category: AgeCategory,
    pub organization_id: String,
    pub department_id: String,
    pub primary_group_id: String,
    /// Capability set; the first entry is the primary skill by convention.
    pub skills: Vec<SkillGrade>,
    pub constraints: EmployeeConstraints,
}

impl Employee {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            employee_number: id.clone(),
            id,
            display_name: display_name.into(),
            employment_type: EmploymentType::FullTime,
            age_category: AgeCategory::Adult,
            organization_id: "org_default".to_string(),
            department_id: "dept_default".to_string(),
            primary_group_id: "group_default".to_string(),
            skills: Vec::new(),
            constraints: EmployeeConstraints::default(),
        }
    }

    pub fn with_department(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = department_id.into();
        self
    }

    pub fn with_age_category(mut self, cat: AgeCategory) -> Self {
        self.age_category = cat;
        self
    }

    pub fn with_skill(mut self, skill_id: impl Into<String>, proficiency: u8) -> Self {
        self.skills.push(SkillGrade::new(skill_id, proficiency));
        self
    }

    pub fn with_constraints(mut self, constraints: EmployeeConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn primary_skill(&self) -> Option<&SkillGrade> {
        self.skills.first()
    }

    pub fn secondary_skills(&self) -> &[SkillGrade] {
        if self.skills.is_empty() {
            &[]
        } else {
            &self.skills[1..]
        }
    }

    pub fn validate(&self) -> WfmResult<()> {
        if self.id.trim().is_empty() {
            return Err(WfmError::Validation("employee id must be non-empty".into()));
        }
        if !(self.constraints.work_rate > 0.0 && self.constraints.work_rate <= 1.0) {
            return Err(WfmError::Validation(format!(
                "work_rate must be in (0, 1], got {}",
                self.constraints.work_rate
            )));
        }
        if self.constraints.max_daily_hours <= 0.0 || self.constraints.max_weekly_hours <= 0.0 {
            return Err(WfmError::Validation("hour caps must be positive".into()));
        }
        if let Some(bad) = self.skills.iter().find(|s| !(1..=5).contains(&s.proficiency)) {
            return Err(WfmError::Validation(format!(
                "proficiency for {} must be 1-5, got {}",
                bad.skill_id, bad.proficiency
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_adult_full_time() {
        let e = Employee::new("emp_1", "A. Ivanova").with_skill("support_l1", 4);
        assert_eq!(e.employment_type, EmploymentType::FullTime);
        assert_eq!(e.age_category, AgeCategory::Adult);
        assert_eq!(e.primary_skill().unwrap().skill_id, "support_l1");
        e.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_work_rate_and_proficiency() {
        let mut e = Employee::new("emp_1", "A");
        e.constraints.work_rate = 0.0;
        assert!(e.validate().is_err());

        let e2 = Employee::new("emp_2", "B").with_skill("sales", 9);
        assert!(e2.validate().is_err());
    }

    #[test]
    fn secondary_skills_exclude_primary() {
        let e = Employee::new("emp_1", "A")
            .with_skill("support_l1", 5)
            .with_skill("sales", 3);
        assert_eq!(e.secondary_skills().len(), 1);
        assert_eq!(e.secondary_skills()[0].skill_id, "sales");
    }
}
