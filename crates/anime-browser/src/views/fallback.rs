//! Static renderers for routes without a live view.

use super::ViewContext;

pub const MY_LIST_CONTAINER: &str = "my-list-container";
pub const SETTINGS_FORM: &str = "settings-form";

pub fn render_my_list(ctx: &ViewContext, _param: Option<&str>) {
    ctx.document.mount(
        &ctx.ticket,
        "my-list",
        "My Anime List",
        &[(MY_LIST_CONTAINER, "Your saved anime will appear here")],
    );
}

pub fn render_settings(ctx: &ViewContext, _param: Option<&str>) {
    ctx.document.mount(
        &ctx.ticket,
        "settings",
        "Settings",
        &[(SETTINGS_FORM, "Theme: light | dark")],
    );
}
