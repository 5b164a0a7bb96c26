use web_sys::Element;

/// Vertical extent of an element and all of its descendants.
///
/// Some layouts report a zero height for a parent whose children do take up
/// space, so the extent is accumulated over the whole subtree. A descendant
/// whose top is exactly 0 does not move the top edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub top: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    pub fn include(&mut self, top: f64, bottom: f64) {
        if top != 0.0 {
            self.top = self.top.min(top);
        }
        self.bottom = self.bottom.max(bottom);
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

pub fn effective_height(element: Option<&Element>) -> f64 {
    let Some(element) = element else {
        return 0.0;
    };
    let rect = element.get_bounding_client_rect();
    let mut bounds = Bounds::new(rect.top(), rect.bottom());
    include_children(element, &mut bounds);
    bounds.height()
}

fn include_children(element: &Element, bounds: &mut Bounds) {
    let children = element.children();
    for i in 0..children.length() {
        let Some(child) = children.item(i) else {
            continue;
        };
        let rect = child.get_bounding_client_rect();
        bounds.include(rect.top(), rect.bottom());
        include_children(&child, bounds);
    }
}

/// CSS height for the main app views: the window height minus always-visible
/// chrome, never below `min_height`. The `2em` keeps desktop browsers from
/// forcing scrollbars onto the body.
pub fn app_view_height(window_height: f64, chrome_height: f64, min_height: f64) -> String {
    let height = window_height - chrome_height;
    let height = if height >= min_height { height } else { min_height };
    format!("calc({height}px - 2em)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_grow_over_children() {
        let mut bounds = Bounds::new(40.0, 40.0);
        bounds.include(20.0, 60.0);
        bounds.include(30.0, 90.0);
        assert_eq!(bounds, Bounds::new(20.0, 90.0));
        assert_eq!(bounds.height(), 70.0);
    }

    #[test]
    fn zero_top_does_not_move_top_edge() {
        let mut bounds = Bounds::new(10.0, 20.0);
        bounds.include(0.0, 25.0);
        assert_eq!(bounds, Bounds::new(10.0, 25.0));
    }

    #[test]
    fn view_height_respects_minimum() {
        assert_eq!(app_view_height(800.0, 120.5, 100.0), "calc(679.5px - 2em)");
        assert_eq!(app_view_height(150.0, 120.0, 100.0), "calc(100px - 2em)");
        assert_eq!(app_view_height(220.0, 120.0, 100.0), "calc(100px - 2em)");
    }
}
