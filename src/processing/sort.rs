// Sort step and the record comparator shared with deduplicate
// Author: Gabriel Demetrios Lafis

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::data::{get_path, total_cmp, Record};
use super::{single_input, ProcessingError, StepOutput, StepProcessor, StepType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

/// Placement of null and absent values, independent of direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    #[default]
    Last,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub nulls: NullsOrder,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        OrderBy {
            field: field.to_string(),
            direction: SortDirection::Asc,
            nulls: NullsOrder::Last,
        }
    }

    pub fn desc(field: &str) -> Self {
        OrderBy {
            direction: SortDirection::Desc,
            ..OrderBy::asc(field)
        }
    }
}

/// Compare two records key by key; later keys break ties of earlier ones
pub fn compare_records(a: &Record, b: &Record, order_by: &[OrderBy]) -> Ordering {
    for key in order_by {
        let x = get_path(a, &key.field).filter(|v| !v.is_null());
        let y = get_path(b, &key.field).filter(|v| !v.is_null());

        let ordering = match (x, y) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => match key.nulls {
                NullsOrder::First => Ordering::Less,
                NullsOrder::Last => Ordering::Greater,
            },
            (Some(_), None) => match key.nulls {
                NullsOrder::First => Ordering::Greater,
                NullsOrder::Last => Ordering::Less,
            },
            (Some(x), Some(y)) => match key.direction {
                SortDirection::Asc => total_cmp(x, y),
                SortDirection::Desc => total_cmp(x, y).reverse(),
            },
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortConfig {
    pub source: String,
    pub output: String,
    pub order_by: Vec<OrderBy>,
}

impl StepProcessor for SortConfig {
    fn step_type(&self) -> StepType {
        StepType::Sort
    }

    fn sources(&self) -> Vec<&str> {
        vec![&self.source]
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn process(&self, inputs: &[&[Record]]) -> Result<StepOutput, ProcessingError> {
        let input = single_input(inputs, self.step_type())?;

        let mut records = input.to_vec();
        // `sort_by` is stable
        records.sort_by(|a, b| compare_records(a, b, &self.order_by));

        Ok(StepOutput::new(records, input.len()))
    }
}
