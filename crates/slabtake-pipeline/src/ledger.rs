//! Accepted regions across the pages of a plan set.
//!
//! The pipeline only proposes candidates. Whatever reviews them (a UI,
//! a script) records its decisions here and reads running totals back.

use serde::{Deserialize, Serialize};

use crate::types::{CandidateMetrics, Polygon};

/// One region a reviewer accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRegion {
    /// Zero-based page the region was found on.
    pub page: u32,
    /// Ledger-assigned id, unique for the ledger's lifetime.
    pub region_id: u64,
    /// Area in square feet.
    pub area_sqft: f64,
    /// Perimeter in linear feet.
    pub perimeter_lf: f64,
    /// Outline in page pixel coordinates.
    pub polygon: Polygon,
}

/// Summed measurements of a set of regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Total area in square feet.
    pub area_sqft: f64,
    /// Total perimeter in linear feet.
    pub perimeter_lf: f64,
}

/// Ordered record of accepted regions.
///
/// Region ids start at 1 and are never reused, even after removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeoffLedger {
    regions: Vec<AcceptedRegion>,
    next_id: u64,
}

impl Default for TakeoffLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TakeoffLedger {
    /// Empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
            next_id: 1,
        }
    }

    /// Record a region and return the stored entry.
    pub fn add_region(
        &mut self,
        page: u32,
        area_sqft: f64,
        perimeter_lf: f64,
        polygon: Polygon,
    ) -> &AcceptedRegion {
        let region_id = self.next_id;
        self.next_id += 1;
        tracing::debug!(page, region_id, area_sqft, perimeter_lf, "accepted region");
        let index = self.regions.len();
        self.regions.push(AcceptedRegion {
            page,
            region_id,
            area_sqft,
            perimeter_lf,
            polygon,
        });
        &self.regions[index]
    }

    /// Record a pipeline candidate as accepted.
    pub fn accept_candidate(
        &mut self,
        page: u32,
        polygon: &Polygon,
        metrics: &CandidateMetrics,
    ) -> &AcceptedRegion {
        self.add_region(page, metrics.area_sqft, metrics.perimeter_lf, polygon.clone())
    }

    /// Remove a region by id, returning it if it was present.
    pub fn remove_region(&mut self, region_id: u64) -> Option<AcceptedRegion> {
        let index = self.regions.iter().position(|r| r.region_id == region_id)?;
        Some(self.regions.remove(index))
    }

    /// All regions in the order they were added.
    #[must_use]
    pub fn regions(&self) -> &[AcceptedRegion] {
        &self.regions
    }

    /// Regions found on `page`, in the order they were added.
    pub fn regions_for_page(&self, page: u32) -> impl Iterator<Item = &AcceptedRegion> {
        self.regions.iter().filter(move |r| r.page == page)
    }

    /// Totals across every page.
    #[must_use]
    pub fn totals(&self) -> LedgerTotals {
        sum(self.regions.iter())
    }

    /// Totals for one page.
    #[must_use]
    pub fn page_totals(&self, page: u32) -> LedgerTotals {
        sum(self.regions_for_page(page))
    }

    /// Number of recorded regions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn sum<'a>(regions: impl Iterator<Item = &'a AcceptedRegion>) -> LedgerTotals {
    regions.fold(LedgerTotals::default(), |acc, r| LedgerTotals {
        area_sqft: acc.area_sqft + r.area_sqft,
        perimeter_lf: acc.perimeter_lf + r.perimeter_lf,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn square(side: f64) -> Polygon {
        Polygon::try_new(vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ])
        .unwrap()
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut ledger = TakeoffLedger::new();
        assert_eq!(ledger.add_region(0, 10.0, 4.0, square(1.0)).region_id, 1);
        assert_eq!(ledger.add_region(0, 20.0, 8.0, square(2.0)).region_id, 2);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut ledger = TakeoffLedger::new();
        ledger.add_region(0, 10.0, 4.0, square(1.0));
        ledger.add_region(0, 20.0, 8.0, square(2.0));
        let removed = ledger.remove_region(2).unwrap();
        assert!((removed.area_sqft - 20.0).abs() < f64::EPSILON);
        assert_eq!(ledger.add_region(1, 5.0, 2.0, square(1.0)).region_id, 3);
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let mut ledger = TakeoffLedger::new();
        ledger.add_region(0, 10.0, 4.0, square(1.0));
        assert!(ledger.remove_region(42).is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn regions_for_page_keeps_insertion_order() {
        let mut ledger = TakeoffLedger::new();
        ledger.add_region(1, 1.0, 1.0, square(1.0));
        ledger.add_region(0, 2.0, 1.0, square(1.0));
        ledger.add_region(1, 3.0, 1.0, square(1.0));
        let ids: Vec<u64> = ledger.regions_for_page(1).map(|r| r.region_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(ledger.regions_for_page(7).count(), 0);
    }

    #[test]
    fn totals_sum_all_pages() {
        let mut ledger = TakeoffLedger::new();
        ledger.add_region(0, 50.0, 30.0, square(1.0));
        ledger.add_region(1, 25.5, 20.25, square(1.0));
        let totals = ledger.totals();
        assert!((totals.area_sqft - 75.5).abs() < 1e-9);
        assert!((totals.perimeter_lf - 50.25).abs() < 1e-9);
        let page_one = ledger.page_totals(1);
        assert!((page_one.area_sqft - 25.5).abs() < 1e-9);
    }

    #[test]
    fn empty_ledger_totals_are_zero() {
        let ledger = TakeoffLedger::default();
        assert!(ledger.is_empty());
        assert_eq!(ledger.totals(), LedgerTotals::default());
    }

    #[test]
    fn accept_candidate_copies_measurements() {
        let mut ledger = TakeoffLedger::new();
        let metrics = CandidateMetrics {
            contour_index: 3,
            area_sqft: 50.0,
            perimeter_lf: 30.0,
            vertex_count: 4,
            sanity_score: 0.06,
            flagged: false,
        };
        let region = ledger.accept_candidate(2, &square(10.0), &metrics).clone();
        assert_eq!(region.page, 2);
        assert!((region.area_sqft - 50.0).abs() < f64::EPSILON);
        assert_eq!(region.polygon.vertex_count(), 4);
    }

    #[test]
    fn ledger_survives_json_round_trip() {
        let mut ledger = TakeoffLedger::new();
        ledger.add_region(0, 1.0, 2.0, square(3.0));
        ledger.remove_region(1);
        let json = serde_json::to_string(&ledger).unwrap();
        let mut restored: TakeoffLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.add_region(0, 1.0, 1.0, square(1.0)).region_id, 2);
    }
}
