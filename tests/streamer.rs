use std::sync::Arc;

use clusterscope::session::Session;
use clusterscope::streamer::Streamer;
use regex::Regex;

#[path = "./utilities.rs"]
mod utilities;
use utilities::sample_dataset;

const HEATMAP_PATTERN: &str =
    r#""columns":\["total_orders","average_spending"\],"kind":"heatmap""#;

#[test]
fn test_streamer_round_trip() {
    let mut session = Session::new(Arc::new(sample_dataset())).unwrap();
    let lines = [
        r#"[{"select_cluster":1},{"select_feature_group":"preferences"}]"#,
        r#"[{"select_heatmap_features":["total_orders","average_spending"]},{"activate":"heatmap"}]"#,
        r#"[{"activate":"heatmap"}]"#,
    ];
    let events = lines
        .into_iter()
        .map(|l| -> Result<String, std::io::Error> { Ok(l.to_string()) });
    let mut result: Vec<String> = vec![];
    let write = |views: String| result.push(views);
    let streamer = Streamer::new(events, write);
    Streamer::run(streamer, &mut session).unwrap();

    assert_eq!(3, result.len());
    assert!(result[0].contains(r#""cluster-graph""#));
    assert!(result[0].contains(r#""kind":"scatter""#));
    assert!(result[0].contains(r#""cluster-summary""#));
    assert!(result[0].contains(r#""cluster-pie""#));
    let re = Regex::new(HEATMAP_PATTERN).unwrap();
    assert!(re.is_match(&result[1]));
    // A re-activation recomputes and republishes the same view.
    assert!(re.is_match(&result[2]));
}
