//! Reviewer → author influence graph.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt::Write;

use devpulse_core::services::InfluenceMapper;
use devpulse_core::{DevpulseError, RenderedImage, ReviewPair};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::svg::{Anchor, SvgDocument};

/// Title drawn above the map.
pub const MAP_TITLE: &str = "Reviewer → Author Influence Map";

/// File name of the rendered map.
pub const MAP_FILENAME: &str = "influence_map.svg";

/// File name of the DOT export.
pub const DOT_FILENAME: &str = "influence_map.dot";

/// Edge drawn when there are no review interactions.
pub const PLACEHOLDER_EDGE: (&str, &str) = ("Reviewer", "Author");

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const NODE_RADIUS: f64 = 36.0;

/// Directed graph of review interactions.
///
/// Nodes are people; an edge `reviewer → author` carries the number of
/// interactions between them. Nodes are inserted in name order, so layout and
/// export are deterministic.
///
/// # Examples
///
/// ```
/// use devpulse_core::ReviewPair;
/// use devpulse_render::influence::InfluenceGraph;
///
/// let pair = |r: &str, a: &str| ReviewPair { reviewer: r.into(), author: a.into() };
/// let graph = InfluenceGraph::from_pairs(&[pair("bob", "alice"), pair("bob", "alice")]);
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.interactions("bob", "alice"), 2);
/// ```
pub struct InfluenceGraph {
    graph: DiGraph<String, u32>,
    name_to_index: BTreeMap<String, NodeIndex>,
}

impl InfluenceGraph {
    /// Build the graph. An empty `pairs` yields the single placeholder edge.
    pub fn from_pairs(pairs: &[ReviewPair]) -> Self {
        let mut counts: BTreeMap<(&str, &str), u32> = BTreeMap::new();
        if pairs.is_empty() {
            counts.insert(PLACEHOLDER_EDGE, 1);
        }
        for pair in pairs {
            *counts
                .entry((pair.reviewer.as_str(), pair.author.as_str()))
                .or_insert(0) += 1;
        }

        let mut names: Vec<&str> = counts.keys().flat_map(|(r, a)| [*r, *a]).collect();
        names.sort_unstable();
        names.dedup();

        let mut graph = DiGraph::new();
        let mut name_to_index = BTreeMap::new();
        for name in names {
            let idx = graph.add_node(name.to_string());
            name_to_index.insert(name.to_string(), idx);
        }

        for ((reviewer, author), count) in counts {
            if let (Some(&from), Some(&to)) =
                (name_to_index.get(reviewer), name_to_index.get(author))
            {
                graph.add_edge(from, to, count);
            }
        }

        Self {
            graph,
            name_to_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of times `reviewer` reviewed `author`.
    pub fn interactions(&self, reviewer: &str, author: &str) -> u32 {
        let (Some(&from), Some(&to)) = (
            self.name_to_index.get(reviewer),
            self.name_to_index.get(author),
        ) else {
            return 0;
        };
        self.graph
            .find_edge(from, to)
            .map_or(0, |e| self.graph[e])
    }

    /// Export in Graphviz DOT format.
    ///
    /// # Examples
    ///
    /// ```
    /// use devpulse_render::influence::InfluenceGraph;
    ///
    /// let dot = InfluenceGraph::from_pairs(&[]).to_dot();
    /// assert!(dot.contains(r#""Reviewer" -> "Author""#));
    /// ```
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph influence {\n");
        for idx in self.graph.node_indices() {
            let _ = writeln!(out, "    {};", dot_quote(&self.graph[idx]));
        }
        for edge in self.graph.edge_references() {
            let _ = writeln!(
                out,
                "    {} -> {} [label=\"{}\"];",
                dot_quote(&self.graph[edge.source()]),
                dot_quote(&self.graph[edge.target()]),
                edge.weight()
            );
        }
        out.push_str("}\n");
        out
    }

    /// Node positions on a circle, in node order.
    fn layout(&self) -> Vec<(f64, f64)> {
        let n = self.graph.node_count();
        let cx = WIDTH as f64 / 2.0;
        let cy = HEIGHT as f64 / 2.0 + 20.0;
        if n == 1 {
            return vec![(cx, cy)];
        }
        let radius = (HEIGHT as f64 / 2.0) - NODE_RADIUS - 50.0;
        (0..n)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / n as f64 - PI / 2.0;
                (cx + radius * angle.cos(), cy + radius * angle.sin())
            })
            .collect()
    }

    /// Render as an SVG document.
    pub fn render_svg(&self) -> String {
        let mut doc = SvgDocument::new(WIDTH, HEIGHT);
        doc.def(
            r##"<marker id="arrow" viewBox="0 0 10 10" refX="10" refY="5" markerWidth="8" markerHeight="8" orient="auto"><path d="M0,0 L10,5 L0,10 z" fill="gray"/></marker>"##,
        );
        doc.text(WIDTH as f64 / 2.0, 35.0, 18, Anchor::Middle, MAP_TITLE);

        let positions = self.layout();
        for edge in self.graph.edge_references() {
            let from = positions[edge.source().index()];
            let to = positions[edge.target().index()];
            let (start, end) = shorten(from, to, NODE_RADIUS);
            doc.line(start, end, "gray", r#" stroke-width="2" marker-end="url(#arrow)""#);
            if *edge.weight() > 1 {
                let mid = ((start.0 + end.0) / 2.0, (start.1 + end.1) / 2.0);
                doc.text(mid.0, mid.1 - 4.0, 11, Anchor::Middle, &edge.weight().to_string());
            }
        }

        for idx in self.graph.node_indices() {
            let (x, y) = positions[idx.index()];
            doc.circle(x, y, NODE_RADIUS, "#87ceeb");
            doc.text(x, y + 4.0, 12, Anchor::Middle, &self.graph[idx]);
        }

        doc.finish()
    }
}

/// Trim a segment so it starts and ends on the node circles.
fn shorten(from: (f64, f64), to: (f64, f64), by: f64) -> ((f64, f64), (f64, f64)) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length <= 2.0 * by {
        return (from, to);
    }
    let (ux, uy) = (dx / length, dy / length);
    (
        (from.0 + ux * by, from.1 + uy * by),
        (to.0 - ux * by, to.1 - uy * by),
    )
}

fn dot_quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// [`InfluenceMapper`] backed by [`InfluenceGraph`].
///
/// # Examples
///
/// ```
/// use devpulse_core::services::InfluenceMapper;
/// use devpulse_render::influence::GraphInfluenceMapper;
///
/// let image = GraphInfluenceMapper.render_influence(&[]).unwrap();
/// assert!(!image.bytes.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphInfluenceMapper;

impl InfluenceMapper for GraphInfluenceMapper {
    fn render_influence(&self, pairs: &[ReviewPair]) -> Result<RenderedImage, DevpulseError> {
        let graph = InfluenceGraph::from_pairs(pairs);
        tracing::debug!(
            people = graph.node_count(),
            edges = graph.edge_count(),
            "rendered influence map"
        );
        Ok(RenderedImage::svg(MAP_FILENAME, graph.render_svg()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(reviewer: &str, author: &str) -> ReviewPair {
        ReviewPair {
            reviewer: reviewer.into(),
            author: author.into(),
        }
    }

    #[test]
    fn empty_pairs_use_placeholder_edge() {
        let graph = InfluenceGraph::from_pairs(&[]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.interactions("Reviewer", "Author"), 1);
    }

    #[test]
    fn repeated_pairs_become_weighted_edge() {
        let graph = InfluenceGraph::from_pairs(&[
            pair("bob", "alice"),
            pair("carol", "alice"),
            pair("bob", "alice"),
        ]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.interactions("bob", "alice"), 2);
        assert_eq!(graph.interactions("alice", "bob"), 0);
    }

    #[test]
    fn svg_has_arrow_per_edge_and_label_per_node() {
        let svg = InfluenceGraph::from_pairs(&[pair("bob", "alice"), pair("carol", "bob")])
            .render_svg();
        assert_eq!(svg.matches("marker-end").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains(">carol<"));
    }

    #[test]
    fn rendering_ignores_pair_order() {
        let a = InfluenceGraph::from_pairs(&[pair("bob", "alice"), pair("carol", "bob")]);
        let b = InfluenceGraph::from_pairs(&[pair("carol", "bob"), pair("bob", "alice")]);
        assert_eq!(a.render_svg(), b.render_svg());
        assert_eq!(a.to_dot(), b.to_dot());
    }

    #[test]
    fn self_review_renders_without_nan() {
        let svg = InfluenceGraph::from_pairs(&[pair("solo", "solo")]).render_svg();
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn dot_escapes_quotes() {
        let dot = InfluenceGraph::from_pairs(&[pair("a\"b", "c")]).to_dot();
        assert!(dot.contains(r#""a\"b" -> "c""#));
    }

    #[test]
    fn mapper_output_is_svg() {
        let image = GraphInfluenceMapper
            .render_influence(&[pair("bob", "alice")])
            .unwrap();
        assert_eq!(image.filename, MAP_FILENAME);
        let svg = String::from_utf8(image.bytes).unwrap();
        assert!(svg.contains(MAP_TITLE));
    }
}
