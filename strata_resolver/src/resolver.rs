//! Choosing the physical tables that answer a request.

use std::{collections::BTreeSet, sync::Arc};

use itertools::Itertools;
use observability_deps::tracing::debug;
use strata_availability::{AvailabilitySnapshot, Interval};
use strata_catalog::{CatalogSnapshot, LogicalTable, PhysicalTable};

use crate::{Constraint, TableResolutionError};

/// One physical table together with the part of the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTable {
    pub table: Arc<PhysicalTable>,
    pub constraint: Constraint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One table answers the whole request.
    Single(ResolvedTable),
    /// Each table answers a disjoint subset of the metrics; results share the dimension grouping.
    Split(Vec<ResolvedTable>),
}

impl Resolution {
    pub fn tables(&self) -> &[ResolvedTable] {
        match self {
            Self::Single(table) => std::slice::from_ref(table),
            Self::Split(tables) => tables,
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, Self::Split(_))
    }
}

/// A candidate that survived schema and availability filtering.
#[derive(Debug)]
struct Eligible {
    /// Position in the logical table's candidate order.
    order: usize,
    table: Arc<PhysicalTable>,
    /// Required metrics the table has and covers over the interval.
    usable: BTreeSet<Arc<str>>,
}

/// Resolves requests against a catalog snapshot and an availability snapshot.
///
/// Resolution reads nothing but its arguments, so callers take one snapshot of each and may
/// resolve concurrently without coordination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableResolver {
    allow_partial_data: bool,
}

impl TableResolver {
    pub fn new(allow_partial_data: bool) -> Self {
        Self { allow_partial_data }
    }

    pub fn allow_partial_data(&self) -> bool {
        self.allow_partial_data
    }

    pub fn resolve(
        &self,
        catalog: &CatalogSnapshot,
        availability: &AvailabilitySnapshot,
        logical: &LogicalTable,
        constraint: &Constraint,
        interval: &Interval,
    ) -> Result<Resolution, TableResolutionError> {
        let candidates: Vec<_> = logical
            .candidates()
            .iter()
            .filter_map(|name| catalog.physical_table(name))
            .collect();
        let eligible: Vec<_> = candidates
            .iter()
            .enumerate()
            .filter_map(|(order, table)| {
                self.eligible(order, table, availability, constraint, interval)
            })
            .collect();

        let required = constraint.metric_names();
        let resolution = if let Some(best) = eligible
            .iter()
            .filter(|e| e.usable.len() == required.len())
            .min_by_key(|e| (e.table.column_count(), e.order))
        {
            Resolution::Single(ResolvedTable {
                table: Arc::clone(&best.table),
                constraint: constraint.clone(),
            })
        } else if let Some(cover) = minimal_cover(&eligible, required) {
            Resolution::Split(split(&cover, constraint))
        } else {
            let error = self.failure(
                &candidates,
                availability,
                logical,
                constraint,
                interval,
                &eligible,
            );
            debug!(
                table = %logical.identifier(),
                %interval,
                %error,
                "no physical table answers request"
            );
            return Err(error);
        };

        debug!(
            table = %logical.identifier(),
            %interval,
            selected = %resolution.tables().iter().map(|r| r.table.name()).join(","),
            split = resolution.is_split(),
            "resolved physical tables"
        );
        Ok(resolution)
    }

    fn usable(
        &self,
        availability: &AvailabilitySnapshot,
        table: &str,
        column: &str,
        interval: &Interval,
    ) -> bool {
        availability
            .coverage(table, column, interval)
            .is_usable(self.allow_partial_data)
    }

    /// A table is eligible when it carries and covers every required dimension and covers at
    /// least one required metric. A request without metrics only needs the dimensions.
    fn eligible(
        &self,
        order: usize,
        table: &Arc<PhysicalTable>,
        availability: &AvailabilitySnapshot,
        constraint: &Constraint,
        interval: &Interval,
    ) -> Option<Eligible> {
        let name = table.name();
        let dimensions_ok = constraint.all_dimension_names().iter().all(|d| {
            table.dimension_names().contains(d) && self.usable(availability, name, d, interval)
        });
        if !dimensions_ok {
            return None;
        }

        let usable: BTreeSet<_> = constraint
            .metric_names()
            .iter()
            .filter(|m| table.metric_columns().contains(*m))
            .filter(|m| self.usable(availability, name, m, interval))
            .cloned()
            .collect();
        if usable.is_empty() && !constraint.metric_names().is_empty() {
            return None;
        }
        Some(Eligible {
            order,
            table: Arc::clone(table),
            usable,
        })
    }

    fn failure(
        &self,
        candidates: &[Arc<PhysicalTable>],
        availability: &AvailabilitySnapshot,
        logical: &LogicalTable,
        constraint: &Constraint,
        interval: &Interval,
        eligible: &[Eligible],
    ) -> TableResolutionError {
        let missing_dimensions: BTreeSet<_> = constraint
            .all_dimension_names()
            .iter()
            .filter(|d| {
                !candidates.iter().any(|t| {
                    t.dimension_names().contains(*d)
                        && self.usable(availability, t.name(), d, interval)
                })
            })
            .cloned()
            .collect();
        // With a dimension missing everywhere nothing is eligible, so only report metrics that
        // no candidate carries and covers.
        let serves = |table: &PhysicalTable, metric: &str| {
            table.metric_columns().contains(metric)
                && self.usable(availability, table.name(), metric, interval)
        };
        let missing_metrics = constraint
            .metric_names()
            .iter()
            .filter(|m| {
                if missing_dimensions.is_empty() {
                    !eligible.iter().any(|e| e.usable.contains(*m))
                } else {
                    !candidates.iter().any(|t| serves(t, m))
                }
            })
            .cloned()
            .collect();
        let unavailable = candidates
            .iter()
            .filter_map(|t| availability.unavailable(t.name()).cloned())
            .collect();

        TableResolutionError {
            table: logical.identifier().clone(),
            missing_dimensions,
            missing_metrics,
            unavailable,
        }
    }
}

/// The smallest set of eligible tables whose usable metrics cover `required`.
///
/// Among covers of equal size the lowest total column count wins, then the earliest candidates.
fn minimal_cover<'a>(
    eligible: &'a [Eligible],
    required: &BTreeSet<Arc<str>>,
) -> Option<Vec<&'a Eligible>> {
    let covers = |tables: &[&Eligible]| {
        required
            .iter()
            .all(|m| tables.iter().any(|e| e.usable.contains(m)))
    };
    if !covers(&eligible.iter().collect::<Vec<_>>()) {
        return None;
    }

    (1..=eligible.len()).find_map(|size| {
        eligible
            .iter()
            .combinations(size)
            .filter(|tables| covers(tables))
            .min_by_key(|tables| {
                let columns: usize = tables.iter().map(|e| e.table.column_count()).sum();
                let order: Vec<_> = tables.iter().map(|e| e.order).collect();
                (columns, order)
            })
    })
}

/// Give each metric to the first table of the cover that can serve it.
fn split(cover: &[&Eligible], constraint: &Constraint) -> Vec<ResolvedTable> {
    let mut remaining = constraint.metric_names().clone();
    cover
        .iter()
        .filter_map(|e| {
            let assigned: BTreeSet<_> = remaining.intersection(&e.usable).cloned().collect();
            if assigned.is_empty() {
                return None;
            }
            remaining.retain(|m| !assigned.contains(m));
            Some(ResolvedTable {
                table: Arc::clone(&e.table),
                constraint: constraint.with_metric_intersection(&assigned),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use strata_availability::{AvailabilityUnavailable, TableAvailability};
    use strata_catalog::{
        ApiFilter, ApiFilters, CatalogBuilder, Dimension, FilterOperation, Granularity,
    };

    use super::*;

    const JAN: &str = "2024-01-01/2024-01-02";

    fn interval(s: &str) -> Interval {
        s.parse().unwrap()
    }

    fn names(names: &[&str]) -> BTreeSet<Arc<str>> {
        names.iter().map(|&n| Arc::from(n)).collect()
    }

    fn builder() -> CatalogBuilder {
        ["country", "page", "user"]
            .into_iter()
            .fold(CatalogSnapshot::builder(), |b, d| {
                b.dimension(Dimension::new(d)).unwrap()
            })
    }

    struct Fixture {
        catalog: CatalogSnapshot,
        availability: AvailabilitySnapshot,
    }

    impl Fixture {
        /// Tables are `(name, dimensions, metrics)`, all fully available over `JAN` unless listed
        /// in `gaps` as `(table, column)`.
        fn new(tables: &[(&str, &[&str], &[&str])], gaps: &[(&str, &str)]) -> Self {
            let mut builder = builder();
            let mut availability = AvailabilitySnapshot::default();
            for &(name, dimensions, metrics) in tables {
                builder = builder
                    .physical_table(
                        name,
                        Granularity::Hour,
                        dimensions.iter().copied(),
                        metrics.iter().copied(),
                    )
                    .unwrap();
                let table = dimensions
                    .iter()
                    .chain(metrics)
                    .filter(|c| !gaps.contains(&(name, **c)))
                    .fold(TableAvailability::default(), |t, c| t.with_complete(c, interval(JAN)));
                availability = availability.with_table(name, table);
            }
            let candidates: Vec<_> = tables.iter().map(|t| t.0).collect();
            let catalog = builder
                .logical_table("wiki", Granularity::Day, candidates)
                .unwrap()
                .build()
                .unwrap();
            Self { catalog, availability }
        }

        fn constraint(&self, dimensions: &[&str], metrics: &[&str]) -> Constraint {
            self.metric_constraint(dimensions, &[], metrics)
        }

        /// Like `constraint`, with `metric_dimensions` required by the metrics' formulas.
        fn metric_constraint(
            &self,
            dimensions: &[&str],
            metric_dimensions: &[&str],
            metrics: &[&str],
        ) -> Constraint {
            let lookup = |names: &[&str]| {
                names
                    .iter()
                    .map(|d| self.catalog.dimension(d).unwrap())
                    .collect::<Vec<_>>()
            };
            Constraint::builder()
                .request_dimensions(lookup(dimensions))
                .filter_dimensions([])
                .metric_dimensions(lookup(metric_dimensions))
                .metric_names(metrics.iter().copied())
                .filters(ApiFilters::new())
                .build()
                .unwrap()
        }

        fn resolve_with(
            &self,
            resolver: TableResolver,
            c: &Constraint,
        ) -> Result<Resolution, TableResolutionError> {
            let logical = self.catalog.logical_table("wiki", Granularity::Day).unwrap();
            resolver.resolve(&self.catalog, &self.availability, &logical, c, &interval(JAN))
        }

        fn resolve(&self, c: &Constraint) -> Result<Resolution, TableResolutionError> {
            self.resolve_with(TableResolver::default(), c)
        }
    }

    fn selected(resolution: &Resolution) -> Vec<(&str, BTreeSet<Arc<str>>)> {
        resolution
            .tables()
            .iter()
            .map(|r| (r.table.name().as_ref(), r.constraint.metric_names().clone()))
            .collect()
    }

    #[test_log::test]
    fn narrowest_table_wins() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country"], &["added", "deleted"]),
                ("t2", &["country"], &["added"]),
            ],
            &[],
        );
        let c = fixture.constraint(&["country"], &["added"]);

        let resolution = fixture.resolve(&c).unwrap();
        assert_matches!(&resolution, Resolution::Single(r) if r.table.name().as_ref() == "t2");
        assert_eq!(resolution.tables()[0].constraint, c);
    }

    #[test]
    fn equal_width_prefers_candidate_order() {
        let fixture = Fixture::new(
            &[
                ("t_b", &["country", "page"], &["added"]),
                ("t_a", &["country", "user"], &["added"]),
            ],
            &[],
        );
        let c = fixture.constraint(&["country"], &["added"]);
        assert_eq!(selected(&fixture.resolve(&c).unwrap())[0].0, "t_b");
    }

    #[test_log::test]
    fn split_across_tables() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country"], &["added"]),
                ("t3", &["country"], &["deleted"]),
            ],
            &[],
        );
        let c = fixture.constraint(&["country"], &["added", "deleted"]);

        let resolution = fixture.resolve(&c).unwrap();
        assert!(resolution.is_split());
        assert_eq!(
            selected(&resolution),
            [("t1", names(&["added"])), ("t3", names(&["deleted"]))]
        );
        assert_eq!(
            resolution.tables()[0].constraint,
            c.with_metric_intersection(&names(&["added"]))
        );
    }

    #[test]
    fn split_by_availability() {
        // Both tables carry both metrics but each is missing one for the interval.
        let fixture = Fixture::new(
            &[
                ("t1", &["country"], &["added", "deleted"]),
                ("t2", &["country"], &["added", "deleted"]),
            ],
            &[("t1", "deleted"), ("t2", "added")],
        );
        let c = fixture.constraint(&["country"], &["added", "deleted"]);

        assert_eq!(
            selected(&fixture.resolve(&c).unwrap()),
            [("t1", names(&["added"])), ("t2", names(&["deleted"]))]
        );
    }

    #[test]
    fn split_uses_fewest_tables() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country"], &["added"]),
                ("t2", &["country"], &["deleted"]),
                ("t3", &["country"], &["deleted", "delta"]),
                ("t4", &["country"], &["added", "delta"]),
            ],
            &[],
        );
        let c = fixture.constraint(&["country"], &["added", "deleted", "delta"]);

        // {t1, t3} and {t2, t4} are two-table covers of equal width; t1 comes first.
        assert_eq!(
            selected(&fixture.resolve(&c).unwrap()),
            [("t1", names(&["added"])), ("t3", names(&["deleted", "delta"]))]
        );
    }

    #[test]
    fn split_tables_must_carry_every_dimension() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country", "page"], &["added"]),
                ("t3", &["country"], &["deleted"]),
            ],
            &[],
        );
        let c = fixture.constraint(&["country", "page"], &["added", "deleted"]);

        let err = fixture.resolve(&c).unwrap_err();
        assert!(err.missing_dimensions.is_empty());
        assert_eq!(err.missing_metrics, names(&["deleted"]));
    }

    #[test_log::test]
    fn missing_dimension_is_named() {
        let fixture = Fixture::new(&[("t1", &["country"], &["added"])], &[]);
        let region = Arc::new(Dimension::new("region"));
        let c = Constraint::builder()
            .request_dimensions([region])
            .filter_dimensions([])
            .metric_dimensions([])
            .metric_names(["added"])
            .filters(ApiFilters::new())
            .build()
            .unwrap();

        let err = fixture.resolve(&c).unwrap_err();
        assert_eq!(err.missing_dimensions, names(&["region"]));
        assert!(err.missing_metrics.is_empty());
        assert!(err.to_string().contains("region"), "{err}");
    }

    #[test]
    fn missing_dimension_and_metric_are_both_named() {
        let fixture = Fixture::new(&[("t1", &["country"], &["added"])], &[("t1", "added")]);
        let c = fixture.constraint(&["country", "page"], &["added", "deleted"]);

        let err = fixture.resolve(&c).unwrap_err();
        assert_eq!(err.missing_dimensions, names(&["page"]));
        assert_eq!(err.missing_metrics, names(&["added", "deleted"]));
    }

    #[test_log::test]
    fn metric_dimensions_must_be_carried() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country"], &["user_sketch"]),
                ("t2", &["country", "user"], &["user_sketch"]),
            ],
            &[],
        );

        let plain = fixture.constraint(&["country"], &["user_sketch"]);
        assert_eq!(selected(&fixture.resolve(&plain).unwrap())[0].0, "t1");

        let c = fixture.metric_constraint(&["country"], &["user"], &["user_sketch"]);
        let resolution = fixture.resolve(&c).unwrap();
        assert_matches!(&resolution, Resolution::Single(r) if r.table.name().as_ref() == "t2");
        assert_eq!(resolution.tables()[0].constraint.metric_dimensions().len(), 1);

        let without_user = Fixture::new(&[("t1", &["country"], &["user_sketch"])], &[]);
        let c = without_user.metric_constraint(&["country"], &["user"], &["user_sketch"]);
        let err = without_user.resolve(&c).unwrap_err();
        assert_eq!(err.missing_dimensions, names(&["user"]));
    }

    #[test]
    fn split_tables_must_carry_metric_dimensions() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country"], &["added"]),
                ("t2", &["country", "user"], &["added"]),
                ("t3", &["country", "user"], &["user_sketch"]),
                ("t4", &["country"], &["user_sketch"]),
            ],
            &[],
        );

        let plain = fixture.constraint(&["country"], &["added", "user_sketch"]);
        assert_eq!(
            selected(&fixture.resolve(&plain).unwrap()),
            [("t1", names(&["added"])), ("t4", names(&["user_sketch"]))]
        );

        let c = fixture.metric_constraint(&["country"], &["user"], &["added", "user_sketch"]);
        let resolution = fixture.resolve(&c).unwrap();
        assert!(resolution.is_split());
        assert_eq!(
            selected(&resolution),
            [("t2", names(&["added"])), ("t3", names(&["user_sketch"]))]
        );
        for r in resolution.tables() {
            assert!(r.table.dimension_names().contains("user"));
            assert!(r.constraint.all_dimension_names().contains("user"));
        }
    }

    #[test]
    fn filter_dimensions_must_be_carried() {
        let fixture = Fixture::new(&[("t1", &["country"], &["added"])], &[]);
        let page = fixture.catalog.dimension("page").unwrap();
        let filters = ApiFilters::new().with_filter(ApiFilter::new(
            Arc::clone(&page),
            "id",
            FilterOperation::Eq,
            ["Main_Page"],
        ));
        let c = Constraint::builder()
            .request_dimensions([])
            .filter_dimensions([page])
            .metric_dimensions([])
            .metric_names(["added"])
            .filters(filters)
            .build()
            .unwrap();

        assert_eq!(fixture.resolve(&c).unwrap_err().missing_dimensions, names(&["page"]));
    }

    #[test]
    fn partial_data_needs_opt_in() {
        let mut fixture = Fixture::new(&[("t1", &["country"], &["added"])], &[("t1", "added")]);
        let partial = TableAvailability::default()
            .with_complete("country", interval(JAN))
            .with_partial("added", interval(JAN));
        fixture.availability = fixture.availability.with_table("t1", partial);
        let c = fixture.constraint(&["country"], &["added"]);

        let err = fixture.resolve(&c).unwrap_err();
        assert_eq!(err.missing_metrics, names(&["added"]));

        let resolution = fixture.resolve_with(TableResolver::new(true), &c).unwrap();
        assert_eq!(selected(&resolution)[0].0, "t1");
    }

    #[test]
    fn unavailable_table_is_excluded() {
        let mut fixture = Fixture::new(
            &[
                ("t2", &["country"], &["added"]),
                ("t1", &["country"], &["added", "deleted"]),
            ],
            &[],
        );
        let c = fixture.constraint(&["country"], &["added"]);
        fixture.availability = fixture
            .availability
            .with_unavailable(AvailabilityUnavailable::Fetch {
                table: Arc::from("t2"),
                attempts: 3,
                reason: "connection refused".to_string(),
            });

        assert_eq!(selected(&fixture.resolve(&c).unwrap())[0].0, "t1");

        fixture.availability = fixture
            .availability
            .with_unavailable(AvailabilityUnavailable::Fetch {
                table: Arc::from("t1"),
                attempts: 3,
                reason: "connection refused".to_string(),
            });
        let err = fixture.resolve(&c).unwrap_err();
        assert_eq!(err.unavailable.len(), 2);
        assert!(err.to_string().contains("connection refused"), "{err}");
    }

    #[test]
    fn dimension_only_request() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country", "page"], &["added"]),
                ("t2", &["country", "page"], &[]),
            ],
            &[],
        );
        let c = fixture.constraint(&["page"], &[]);
        assert_eq!(selected(&fixture.resolve(&c).unwrap())[0].0, "t2");
    }

    #[test]
    fn unconstrained_selects_itself() {
        let fixture = Fixture::new(
            &[
                ("t1", &["country", "page", "user"], &["added", "deleted"]),
                ("t2", &["country"], &["added"]),
                ("t3", &["page"], &["deleted"]),
            ],
            &[],
        );
        for name in ["t1", "t2", "t3"] {
            let table = fixture.catalog.physical_table(name).unwrap();
            let resolution = fixture.resolve(&Constraint::unconstrained(&table)).unwrap();
            assert_matches!(resolution, Resolution::Single(r) if r.table.name().as_ref() == name);
        }
    }

    const DIMENSIONS: [&str; 3] = ["country", "page", "user"];
    const METRICS: [&str; 4] = ["added", "deleted", "delta", "edits"];

    fn arb_schema() -> impl Strategy<Value = (Vec<&'static str>, Vec<&'static str>)> {
        (
            proptest::sample::subsequence(&DIMENSIONS[..], 0..=DIMENSIONS.len()),
            proptest::sample::subsequence(&METRICS[..], 0..=METRICS.len()),
        )
    }

    proptest! {
        #[test]
        fn selections_always_carry_their_columns(
            schemas in proptest::collection::vec(arb_schema(), 1..5),
            request in arb_schema(),
        ) {
            let names: Vec<_> = (0..schemas.len()).map(|i| format!("t{i}")).collect();
            let tables: Vec<(&str, &[&str], &[&str])> = names
                .iter()
                .zip(&schemas)
                .map(|(n, (d, m))| (n.as_str(), d.as_slice(), m.as_slice()))
                .collect();
            let fixture = Fixture::new(&tables, &[]);
            let c = fixture.constraint(&request.0, &request.1);

            if let Ok(resolution) = fixture.resolve(&c) {
                let mut served = BTreeSet::new();
                for r in resolution.tables() {
                    for column in r.constraint.all_column_names() {
                        prop_assert!(r.table.has_column(column));
                    }
                    prop_assert!(served.is_disjoint(r.constraint.metric_names()));
                    served.extend(r.constraint.metric_names().iter().cloned());
                }
                prop_assert_eq!(&served, c.metric_names());
            }
        }
    }
}
