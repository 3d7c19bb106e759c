//! The reactive binding graph: a declarative mapping from input controls to
//! derived outputs.
//!
//! Each binding declares the inputs it depends on and one pure compute
//! function producing one output. A reaction pass takes the batch of
//! inputs changed by a single user action, finds the affected bindings
//! (transitively, when an output feeds another binding's input), and
//! evaluates each exactly once, in dependency order. A failing compute
//! publishes an error placeholder for its own output and never stops its
//! siblings.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

use crate::chart::ChartDescription;
use crate::dataset::Dataset;
use crate::error::ViewError;

/// A fatal binding configuration error, raised when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("two bindings produce output {0:?}")]
    DuplicateOutput(String),
    #[error("binding dependency cycle through output {0:?}")]
    Cycle(String),
}

type Compute<S> = Box<dyn Fn(&Dataset, &S) -> Result<ChartDescription, ViewError>>;

/// One declared relationship: a set of inputs, one output, one pure
/// compute function of the current state plus the immutable dataset.
pub struct Binding<S> {
    inputs: Vec<String>,
    output: String,
    compute: Compute<S>,
}

impl<S> Binding<S> {
    pub fn new(
        inputs: &[&str],
        output: &str,
        compute: impl Fn(&Dataset, &S) -> Result<ChartDescription, ViewError> + 'static,
    ) -> Binding<S> {
        Binding {
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
            output: output.to_string(),
            compute: Box::new(compute),
        }
    }
}

/// The binding graph, evaluation-ordered at build time.
pub struct BindingGraph<S> {
    bindings: Vec<Binding<S>>,
    order: Vec<usize>,
    by_output: HashMap<String, usize>,
}

impl<S> BindingGraph<S> {
    /// Builds the graph, failing on a duplicate output or a dependency
    /// cycle. Both are configuration mistakes, fatal by design.
    pub fn build(bindings: Vec<Binding<S>>) -> Result<BindingGraph<S>, ConfigError> {
        let mut by_output = HashMap::new();
        for (at, binding) in bindings.iter().enumerate() {
            if by_output.insert(binding.output.clone(), at).is_some() {
                return Err(ConfigError::DuplicateOutput(binding.output.clone()));
            }
        }
        let order = topological_order(&bindings, &by_output)?;
        Ok(BindingGraph {
            bindings,
            order,
            by_output,
        })
    }

    /// Runs one reaction pass for a batch of changed inputs.
    ///
    /// Every affected binding is evaluated exactly once, in dependency
    /// order; a batch touching several inputs of one binding still yields a
    /// single evaluation. Results are published in evaluation order.
    pub fn react(
        &self,
        changed: &HashSet<String>,
        data: &Dataset,
        state: &S,
    ) -> Vec<(String, ChartDescription)> {
        let mut affected = vec![false; self.bindings.len()];
        let mut published = vec![];
        for &at in &self.order {
            let binding = &self.bindings[at];
            let hit = binding.inputs.iter().any(|input| {
                changed.contains(input)
                    || self
                        .by_output
                        .get(input)
                        .map_or(false, |&upstream| affected[upstream])
            });
            if !hit {
                continue;
            }
            affected[at] = true;
            let chart = match (binding.compute)(data, state) {
                Ok(chart) => chart,
                Err(reason) => {
                    warn!(output = %binding.output, %reason, "binding evaluation failed");
                    ChartDescription::failed(&binding.output, reason.to_string())
                }
            };
            published.push((binding.output.clone(), chart));
        }
        published
    }

    /// The declared output identifiers, in evaluation order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .map(|&at| self.bindings[at].output.as_str())
    }
}

/// Kahn ordering over the output-feeds-input edges.
fn topological_order<S>(
    bindings: &[Binding<S>],
    by_output: &HashMap<String, usize>,
) -> Result<Vec<usize>, ConfigError> {
    let n = bindings.len();
    let mut downstream = vec![vec![]; n];
    let mut pending = vec![0usize; n];
    for (at, binding) in bindings.iter().enumerate() {
        for input in &binding.inputs {
            if let Some(&upstream) = by_output.get(input) {
                downstream[upstream].push(at);
                pending[at] += 1;
            }
        }
    }
    let mut ready: Vec<usize> = (0..n).filter(|&at| pending[at] == 0).collect();
    let mut order = vec![];
    while let Some(at) = ready.pop() {
        order.push(at);
        for &next in &downstream[at] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push(next);
            }
        }
    }
    if order.len() < n {
        let stuck = (0..n)
            .find(|&at| pending[at] > 0)
            .map(|at| bindings[at].output.clone())
            .unwrap_or_default();
        return Err(ConfigError::Cycle(stuck));
    }
    // Publication should follow declaration order whenever dependencies
    // allow it.
    order.sort_by_key(|&at| (depth(at, bindings, by_output), at));
    Ok(order)
}

/// Longest chain of output-to-input edges above a binding.
fn depth<S>(at: usize, bindings: &[Binding<S>], by_output: &HashMap<String, usize>) -> usize {
    bindings[at]
        .inputs
        .iter()
        .filter_map(|input| by_output.get(input))
        .map(|&upstream| depth(upstream, bindings, by_output) + 1)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use crate::bindings::*;
    use crate::chart::ChartDescription;
    use crate::dataset::Dataset;
    use crate::error::ViewError;

    const CSV: &str = "customer_id,merged_labels,spend\nc1,0,1.0\nc2,1,2.0\n";

    fn dataset() -> Dataset {
        Dataset::from_csv(CSV, &[]).unwrap()
    }

    fn constant(name: &str) -> ChartDescription {
        ChartDescription::empty(name)
    }

    fn changed(inputs: &[&str]) -> HashSet<String> {
        inputs.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_only_affected_bindings_run() {
        let graph = BindingGraph::build(vec![
            Binding::new(&["a"], "out-a", |_, _: &()| Ok(constant("a"))),
            Binding::new(&["b"], "out-b", |_, _: &()| Ok(constant("b"))),
        ])
        .unwrap();
        let published = graph.react(&changed(&["a"]), &dataset(), &());
        assert_eq!(1, published.len());
        assert_eq!("out-a", published[0].0);
    }

    #[test]
    fn test_batched_inputs_coalesce() {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let graph = BindingGraph::build(vec![Binding::new(&["a", "b"], "out", move |_, _: &()| {
            seen.set(seen.get() + 1);
            Ok(constant("out"))
        })])
        .unwrap();
        let published = graph.react(&changed(&["a", "b"]), &dataset(), &());
        assert_eq!(1, published.len());
        assert_eq!(1, count.get());
    }

    #[test]
    fn test_chained_bindings_evaluate_in_order() {
        let graph = BindingGraph::build(vec![
            Binding::new(&["out-up"], "out-down", |_, _: &()| Ok(constant("down"))),
            Binding::new(&["a"], "out-up", |_, _: &()| Ok(constant("up"))),
        ])
        .unwrap();
        let published = graph.react(&changed(&["a"]), &dataset(), &());
        let outputs: Vec<&str> = published.iter().map(|(output, _)| output.as_str()).collect();
        assert_eq!(vec!["out-up", "out-down"], outputs);
    }

    #[test]
    fn test_duplicate_output_is_fatal() {
        let result = BindingGraph::build(vec![
            Binding::new(&["a"], "out", |_, _: &()| Ok(constant("1"))),
            Binding::new(&["b"], "out", |_, _: &()| Ok(constant("2"))),
        ]);
        assert!(matches!(
            result.map(|_| ()),
            Err(ConfigError::DuplicateOutput(output)) if output == "out"
        ));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let result = BindingGraph::build(vec![
            Binding::new(&["out-b"], "out-a", |_, _: &()| Ok(constant("a"))),
            Binding::new(&["out-a"], "out-b", |_, _: &()| Ok(constant("b"))),
        ]);
        assert!(matches!(result.map(|_| ()), Err(ConfigError::Cycle(_))));
    }

    #[test]
    fn test_failing_binding_is_isolated() {
        let graph = BindingGraph::build(vec![
            Binding::new(&["a"], "broken", |_, _: &()| {
                Err(ViewError::UnknownGroup("gone".to_string()))
            }),
            Binding::new(&["a"], "healthy", |_, _: &()| Ok(constant("fine"))),
        ])
        .unwrap();
        let published = graph.react(&changed(&["a"]), &dataset(), &());
        assert_eq!(2, published.len());
        assert_eq!("error", published[0].1.kind());
        assert_eq!("healthy", published[1].0);
        assert_eq!("empty", published[1].1.kind());
    }
}
