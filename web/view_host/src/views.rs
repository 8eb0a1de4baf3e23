use live_view_runtime::{Result, Select, SelectOption, SelectValue, View, ViewContext, view_fn};
use tracing::info;

pub const DEFAULT_ROUTE: &str = "/select/nothing-selected/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SelectNothingSelected,
    SelectPreSelected,
    MultiSelectNothingSelected,
    MultiSelectPreSelected,
    SelectBubble,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "/select/nothing-selected" => Some(Route::SelectNothingSelected),
            "/select/pre-selected" => Some(Route::SelectPreSelected),
            "/multi-select/nothing-selected" => Some(Route::MultiSelectNothingSelected),
            "/multi-select/pre-selected" => Some(Route::MultiSelectPreSelected),
            "/select/bubble" => Some(Route::SelectBubble),
            _ => None,
        }
    }

    fn select(self) -> Select {
        let select = match self {
            Route::SelectNothingSelected | Route::SelectBubble => {
                Select::new(foo_bar_baz([false, false, false]))
            }
            Route::SelectPreSelected => Select::new(foo_bar_baz([false, true, false])),
            Route::MultiSelectNothingSelected => {
                Select::new(foo_bar_baz([false, false, false])).multiple(true)
            }
            Route::MultiSelectPreSelected => {
                Select::new(foo_bar_baz([true, true, false])).multiple(true)
            }
        };
        select.bubble_up(self == Route::SelectBubble)
    }

    pub fn view(self) -> impl View {
        view_fn(move |ctx| match self {
            Route::SelectBubble => bubble_view(ctx),
            _ => select_view(ctx, self.select()),
        })
    }
}

fn foo_bar_baz(selected: [bool; 3]) -> Vec<SelectOption> {
    vec![
        SelectOption::new("Foo", "foo").selected(selected[0]),
        SelectOption::new("Bar", "bar").selected(selected[1]),
        SelectOption::new("Baz", "baz").selected(selected[2]),
    ]
}

fn describe(value: &SelectValue) -> String {
    match value {
        SelectValue::Single(Some(value)) => value.clone(),
        SelectValue::Single(None) => "<none>".to_string(),
        SelectValue::Multiple(values) => format!("[{}]", values.join(", ")),
    }
}

fn select_view(ctx: &mut ViewContext<'_>, select: Select) -> Result<()> {
    let id = ctx.build(select)?;
    ctx.set_attribute(id, "name", "fruit")?;
    ctx.show(id)?;
    info!(value = %describe(&ctx.select_value(id)?), "initial value");

    loop {
        ctx.wait_for_change(Some(id))?;
        info!(value = %describe(&ctx.select_value(id)?), "value changed");
    }
}

// Waits on the form rather than the select; only bubbled changes reach it.
fn bubble_view(ctx: &mut ViewContext<'_>) -> Result<()> {
    let form = ctx.create_element("form")?;
    let label = ctx.create_element("label")?;
    ctx.set_attribute(label, "class", "fruit-label")?;
    let select = ctx.build(Route::SelectBubble.select())?;
    ctx.append_child(form, label)?;
    ctx.append_child(form, select)?;
    ctx.show(form)?;

    loop {
        ctx.wait_for_change(Some(form))?;
        let value = describe(&ctx.select_value(select)?);
        info!(%value, "form saw a change");
        ctx.set_attribute(label, "value", format!("picked {value}"))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use live_view_runtime::{
        Connection, InboundEvent, NodeId, RemoteMirror, ServerEnvelope, SyncError,
    };
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn open(route: Route) -> (Connection, Receiver<ServerEnvelope>, RemoteMirror) {
        let (tx, rx) = mpsc::sync_channel(64);
        let connection = Connection::open("S1", route.view(), tx).expect("open");
        let mut mirror = RemoteMirror::new();
        mirror
            .apply(&rx.recv_timeout(TIMEOUT).expect("render"))
            .expect("apply render");
        (connection, rx, mirror)
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn parses_routes_with_or_without_trailing_slash() {
        assert_eq!(
            Route::parse(DEFAULT_ROUTE),
            Some(Route::SelectNothingSelected)
        );
        assert_eq!(
            Route::parse("/multi-select/pre-selected"),
            Some(Route::MultiSelectPreSelected)
        );
        assert_eq!(Route::parse("/select/unknown/"), None);
    }

    #[test]
    fn pre_selected_routes_render_their_initial_values() {
        let (connection, _rx, mirror) = open(Route::SelectPreSelected);
        let root = mirror.root().expect("root");
        assert_eq!(mirror.selected_values(root), values(&["bar"]));
        connection.close();
        connection.join().ok();

        let (connection, _rx, mirror) = open(Route::MultiSelectPreSelected);
        let root = mirror.root().expect("root");
        assert_eq!(mirror.selected_values(root), values(&["foo", "bar"]));
        connection.close();
        connection.join().ok();
    }

    #[test]
    fn multi_select_route_follows_events() {
        let (connection, rx, mut mirror) = open(Route::MultiSelectNothingSelected);
        let select = mirror.root().expect("root");
        assert!(mirror.selected_values(select).is_empty());

        connection
            .dispatch(InboundEvent::change(
                select,
                live_view_runtime::EventValue::many(["baz", "foo"]),
            ))
            .expect("dispatch");
        mirror
            .apply(&rx.recv_timeout(TIMEOUT).expect("patch"))
            .expect("apply patch");
        assert_eq!(mirror.selected_values(select), values(&["foo", "baz"]));

        connection.close();
        assert!(matches!(connection.join(), Err(SyncError::ConnectionClosed)));
    }

    #[test]
    fn bubble_route_updates_label_after_resume() {
        let (connection, rx, mut mirror) = open(Route::SelectBubble);
        let form = mirror.root().expect("root");
        let children = mirror.node(form).expect("form").children_ids.clone();
        let (label, select): (NodeId, NodeId) = (children[0], children[1]);

        connection
            .dispatch(InboundEvent::change(select, "baz"))
            .expect("dispatch");

        // One patch from the dispatcher, one from the view's label update.
        for _ in 0..2 {
            mirror
                .apply(&rx.recv_timeout(TIMEOUT).expect("patch"))
                .expect("apply patch");
        }
        assert_eq!(mirror.selected_values(select), values(&["baz"]));
        assert_eq!(
            mirror.node(label).expect("label").attributes.get("value"),
            Some(&live_view_runtime::AttrValue::Text("picked baz".into()))
        );

        connection.close();
        connection.join().ok();
    }
}
