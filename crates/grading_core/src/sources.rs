//! Read-only collaborators: grade reference data and headcount.

use crate::error::Result;
use crate::types::{Grade, GradeTable, Headcount};

/// Supplies the grade ordering and the authoritative current table.
pub trait GradeReferenceSource {
    fn grades(&self) -> Result<Vec<Grade>>;

    /// The live table maintained outside this engine, if any.
    fn current_table(&self) -> Result<Option<GradeTable>>;
}

pub trait HeadcountSource {
    fn headcount_by_grade(&self) -> Result<Headcount>;
}

/// In-memory reference data.
#[derive(Debug, Clone, Default)]
pub struct StaticReference {
    pub grades: Vec<Grade>,
    pub current_table: Option<GradeTable>,
}

impl StaticReference {
    pub fn new(grades: Vec<Grade>) -> Self {
        Self { grades, current_table: None }
    }

    pub fn with_current_table(mut self, table: GradeTable) -> Self {
        self.current_table = Some(table);
        self
    }
}

impl GradeReferenceSource for StaticReference {
    fn grades(&self) -> Result<Vec<Grade>> {
        Ok(self.grades.clone())
    }

    fn current_table(&self) -> Result<Option<GradeTable>> {
        Ok(self.current_table.clone())
    }
}

impl HeadcountSource for Headcount {
    fn headcount_by_grade(&self) -> Result<Headcount> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build;
    use crate::types::{HorizontalIntervals, ScenarioInputs};

    #[test]
    fn test_static_reference() {
        let grades = vec![Grade::new("Lead", 0), Grade::base("Analyst", 1)];
        let reference = StaticReference::new(grades.clone());
        assert_eq!(reference.grades().unwrap(), grades);
        assert!(reference.current_table().unwrap().is_none());

        let inputs = ScenarioInputs::new(500.0, HorizontalIntervals::uniform(5.0)).with_vertical("Lead", 30.0);
        let table = build(&grades, &inputs).unwrap();
        let reference = reference.with_current_table(table.clone());
        assert_eq!(reference.current_table().unwrap(), Some(table));
    }

    #[test]
    fn test_headcount_map_is_a_source() {
        let headcount = Headcount::from([("Analyst".to_string(), 12), ("Lead".to_string(), 3)]);
        let source: &dyn HeadcountSource = &headcount;
        assert_eq!(source.headcount_by_grade().unwrap()["Analyst"], 12);
    }
}
