//! `NetStore`: a [`BoundedOrderedStore`] specialized to `NetEntry`.

use super::BoundedOrderedStore;
use crate::filter::CompiledNetFilter;
use crate::model::NetEntry;

pub type NetStore = BoundedOrderedStore<NetEntry, CompiledNetFilter>;
