use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Gauge, Histogram,
};

pub static QUERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "modelfilter_queries_total",
        "Query executions by result",
        &["result"]
    )
    .unwrap()
});

pub static QUERY_DURATION_SEC: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "modelfilter_query_duration_seconds",
        "Query evaluation time",
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

pub static QUERY_MATCHES: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "modelfilter_query_matches",
        "Matched identifiers per query",
        vec![0.0, 1.0, 10.0, 100.0, 1000.0, 10000.0, 100000.0]
    )
    .unwrap()
});

pub static DEGRADED_NODES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "modelfilter_degraded_nodes_total",
        "Query nodes evaluated as matching nothing, by kind",
        &["kind"]
    )
    .unwrap()
});

pub static ITEMS_LOADED: Lazy<Gauge> =
    Lazy::new(|| register_gauge!("modelfilter_items_loaded", "Items in the loaded collection").unwrap());

pub static SAVED_QUERY_OPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "modelfilter_saved_queries_ops_total",
        "Saved query operations",
        &["op"]
    )
    .unwrap()
});
