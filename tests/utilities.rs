use clusterscope::dataset::{Dataset, DEFAULT_GROUPS};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Cluster sizes of the generated dataset: 500 customers, cluster 1 small.
#[allow(unused)]
pub const CLUSTERS: [(i64, usize); 3] = [(0, 230), (1, 40), (2, 230)];

/// Generates the CSV text of a synthetic customer table carrying every
/// column the standard feature groups need, plus the ordering column and
/// two categorical columns.
#[allow(unused)]
pub fn sample_csv() -> String {
    let mut rng = StdRng::seed_from_u64(271828182845);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let mut csv = String::from(
        "customer_id,merged_labels,vendor_loyalty_score,relative_cuisine_variety,\
chain_consumption,first_order,days_since_last_order,order_frequency,total_orders,\
total_amount_spent,average_spending,customer_age,payment_method,customer_city\n",
    );
    let cities = ["Porto", "Lisbon", "Faro"];
    let methods = ["card", "cash"];
    let mut id = 0;
    for (cluster, size) in CLUSTERS {
        let center = 10. * (cluster + 1) as f64;
        for _ in 0..size {
            id += 1;
            let mut feature = || center + noise.sample(&mut rng);
            let row = format!(
                "c{id},{cluster},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{},{},{}\n",
                feature(),
                feature(),
                feature(),
                feature(),
                feature(),
                feature(),
                feature(),
                feature(),
                feature(),
                18 + id % 50,
                methods[id % 2],
                cities[id % 3],
            );
            csv.push_str(&row);
        }
    }
    csv
}

/// The generated dataset with the standard feature groups registered.
#[allow(unused)]
pub fn sample_dataset() -> Dataset {
    Dataset::from_csv(&sample_csv(), DEFAULT_GROUPS).unwrap()
}
