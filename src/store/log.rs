//! `LogStore`: a [`BoundedOrderedStore`] specialized to `LogEntry`.

use super::BoundedOrderedStore;
use crate::filter::CompiledLogFilter;
use crate::model::LogEntry;

pub type LogStore = BoundedOrderedStore<LogEntry, CompiledLogFilter>;
