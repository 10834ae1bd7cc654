//! Border style resolution with neighbor-edge inheritance
//!
//! Authors often declare a border on only one side of a shared edge. A cell
//! with no border on an edge therefore looks at the touching neighbor's
//! opposite edge before falling back to the gridline.

use super::color::{ColorResolver, ColorRole};
use super::reader::{RawBorder, RawBorderSide};
use crate::types::format_number;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DashPattern {
    Solid,
    Dotted,
    Dashed,
    Double,
}

impl fmt::Display for DashPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DashPattern::Solid => "solid",
            DashPattern::Dotted => "dotted",
            DashPattern::Dashed => "dashed",
            DashPattern::Double => "double",
        };
        f.write_str(name)
    }
}

/// Where a resolved edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSource {
    Declared,
    Neighbor,
    Gridline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderEdge {
    pub width_px: f64,
    pub dash: DashPattern,
    pub color: String,
    pub source: EdgeSource,
}

impl fmt::Display for BorderEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px {} {}", format_number(self.width_px), self.dash, self.color)
    }
}

/// All four edges of a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellBorder {
    pub top: BorderEdge,
    pub right: BorderEdge,
    pub bottom: BorderEdge,
    pub left: BorderEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];

    pub fn opposite(self) -> Edge {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Right => Edge::Left,
            Edge::Bottom => Edge::Top,
            Edge::Left => Edge::Right,
        }
    }

    /// Position of the cell sharing this edge, if inside the sheet origin
    pub fn neighbor(self, row: usize, col: usize) -> Option<(usize, usize)> {
        match self {
            Edge::Top => Some((row.checked_sub(1)?, col)),
            Edge::Right => Some((row, col + 1)),
            Edge::Bottom => Some((row + 1, col)),
            Edge::Left => Some((row, col.checked_sub(1)?)),
        }
    }

    pub fn side(self, border: &RawBorder) -> Option<&RawBorderSide> {
        match self {
            Edge::Top => border.top.as_ref(),
            Edge::Right => border.right.as_ref(),
            Edge::Bottom => border.bottom.as_ref(),
            Edge::Left => border.left.as_ref(),
        }
        .filter(|side| side.is_declared())
    }
}

/// Width and dash pattern for a border style keyword. Unknown keywords draw
/// a thin solid line.
pub fn style_metrics(keyword: &str) -> (f64, DashPattern) {
    match keyword {
        "thick" => (2.0, DashPattern::Solid),
        "medium" => (1.5, DashPattern::Solid),
        "thin" | "hair" => (1.0, DashPattern::Solid),
        "dotted" => (1.0, DashPattern::Dotted),
        "dashed" | "dashDot" | "dashDotDot" | "mediumDashed" | "mediumDashDot"
        | "mediumDashDotDot" | "slantDashDot" => (1.0, DashPattern::Dashed),
        "double" => (3.0, DashPattern::Double),
        _ => (1.0, DashPattern::Solid),
    }
}

pub struct BorderStyleResolver<'a> {
    colors: &'a ColorResolver,
    gridline: BorderEdge,
}

impl<'a> BorderStyleResolver<'a> {
    pub fn new(colors: &'a ColorResolver, gridline_color: &str) -> Self {
        Self {
            colors,
            gridline: BorderEdge {
                width_px: 1.0,
                dash: DashPattern::Solid,
                color: gridline_color.to_string(),
                source: EdgeSource::Gridline,
            },
        }
    }

    pub fn gridline(&self) -> &BorderEdge {
        &self.gridline
    }

    /// Resolve one declared side
    pub fn resolve_side(&self, side: &RawBorderSide) -> BorderEdge {
        let (width_px, dash) = style_metrics(side.style.as_deref().unwrap_or_default());
        let color = match &side.color {
            Some(descriptor) => self.colors.resolve(descriptor, ColorRole::Border),
            None => ColorRole::Border.default_hex().to_string(),
        };
        BorderEdge {
            width_px,
            dash,
            color,
            source: EdgeSource::Declared,
        }
    }

    /// Resolve every edge of the cell at (row, col). `border_at` returns the
    /// declared border of any cell in the sheet. `None` when no edge is
    /// declared on the cell or inherited from a neighbor.
    pub fn resolve_cell<'b, F>(&self, row: usize, col: usize, border_at: F) -> Option<CellBorder>
    where
        F: Fn(usize, usize) -> Option<&'b RawBorder>,
    {
        let own = border_at(row, col);
        let mut any = false;

        let edges = Edge::ALL.map(|edge| {
            if let Some(side) = own.and_then(|b| edge.side(b)) {
                any = true;
                return self.resolve_side(side);
            }
            let inherited = edge
                .neighbor(row, col)
                .and_then(|(r, c)| border_at(r, c))
                .and_then(|b| edge.opposite().side(b));
            match inherited {
                Some(side) => {
                    any = true;
                    BorderEdge {
                        source: EdgeSource::Neighbor,
                        ..self.resolve_side(side)
                    }
                }
                None => self.gridline.clone(),
            }
        });

        if !any {
            return None;
        }
        let [top, right, bottom, left] = edges;
        Some(CellBorder {
            top,
            right,
            bottom,
            left,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::color::ColorDescriptor;
    use std::collections::HashMap;

    fn grid(entries: Vec<((usize, usize), RawBorder)>) -> HashMap<(usize, usize), RawBorder> {
        entries.into_iter().collect()
    }

    #[test]
    fn test_style_metrics() {
        assert_eq!(style_metrics("thick"), (2.0, DashPattern::Solid));
        assert_eq!(style_metrics("medium"), (1.5, DashPattern::Solid));
        assert_eq!(style_metrics("hair"), (1.0, DashPattern::Solid));
        assert_eq!(style_metrics("dotted"), (1.0, DashPattern::Dotted));
        assert_eq!(style_metrics("mediumDashDotDot"), (1.0, DashPattern::Dashed));
        assert_eq!(style_metrics("double"), (3.0, DashPattern::Double));
        assert_eq!(style_metrics("wavy"), (1.0, DashPattern::Solid));
    }

    #[test]
    fn test_resolve_side_color() {
        let colors = ColorResolver::default();
        let resolver = BorderStyleResolver::new(&colors, "#D4D4D4");

        let plain = resolver.resolve_side(&RawBorderSide::new("medium"));
        assert_eq!(plain.to_string(), "1.5px solid #000000");

        let themed = RawBorderSide {
            style: Some("double".to_string()),
            color: Some(ColorDescriptor::theme(4, None)),
        };
        assert_eq!(resolver.resolve_side(&themed).to_string(), "3px double #4472C4");
    }

    #[test]
    fn test_inherits_neighbor_opposite_edge() {
        let colors = ColorResolver::default();
        let resolver = BorderStyleResolver::new(&colors, "#D4D4D4");
        // the cell below declares its top edge only
        let borders = grid(vec![(
            (1, 0),
            RawBorder {
                top: Some(RawBorderSide::new("thick")),
                ..Default::default()
            },
        )]);

        let above = resolver
            .resolve_cell(0, 0, |r, c| borders.get(&(r, c)))
            .unwrap();
        assert_eq!(above.bottom.source, EdgeSource::Neighbor);
        assert_eq!(above.bottom.width_px, 2.0);
        assert_eq!(above.top.source, EdgeSource::Gridline);
        assert_eq!(above.top.color, "#D4D4D4");

        let own = resolver
            .resolve_cell(1, 0, |r, c| borders.get(&(r, c)))
            .unwrap();
        assert_eq!(own.top.source, EdgeSource::Declared);
    }

    #[test]
    fn test_declared_wins_over_neighbor() {
        let colors = ColorResolver::default();
        let resolver = BorderStyleResolver::new(&colors, "#D4D4D4");
        let borders = grid(vec![
            (
                (0, 0),
                RawBorder {
                    right: Some(RawBorderSide::new("dotted")),
                    ..Default::default()
                },
            ),
            (
                (0, 1),
                RawBorder {
                    left: Some(RawBorderSide::new("thick")),
                    ..Default::default()
                },
            ),
        ]);
        let cell = resolver
            .resolve_cell(0, 0, |r, c| borders.get(&(r, c)))
            .unwrap();
        assert_eq!(cell.right.dash, DashPattern::Dotted);
        assert_eq!(cell.right.source, EdgeSource::Declared);
    }

    #[test]
    fn test_no_border_anywhere() {
        let colors = ColorResolver::default();
        let resolver = BorderStyleResolver::new(&colors, "#D4D4D4");
        let borders = grid(vec![(
            (5, 5),
            RawBorder {
                top: Some(RawBorderSide::new("none")),
                ..Default::default()
            },
        )]);
        assert!(resolver
            .resolve_cell(0, 0, |r, c| borders.get(&(r, c)))
            .is_none());
        assert!(resolver
            .resolve_cell(5, 5, |r, c| borders.get(&(r, c)))
            .is_none());
    }
}
