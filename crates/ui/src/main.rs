use gpui::*;
use gpui_component::Root;
use gpui_component::notification::NotificationList;

use natter::app::{ChatAppShell, Quit};
use natter::settings::SettingsStore;

/// Application entry point.
///
/// Loads settings (writing a default file on first run), initializes the
/// tokio bridge and gpui-component, then opens the composer window.
fn main() {
    tracing_subscriber::fmt::init();

    let settings_store = SettingsStore::load();
    match settings_store.write_if_missing() {
        Ok(true) => tracing::info!(
            "wrote default settings to {:?}",
            settings_store.config_path()
        ),
        Ok(false) => {}
        Err(error) => tracing::warn!("failed to write default settings: {}", error),
    }

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(move |cx| {
        gpui_tokio_bridge::init(cx);

        // Required before any Root usage.
        gpui_component::init(cx);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([
            KeyBinding::new("cmd-q", Quit, None),
            KeyBinding::new("ctrl-q", Quit, None),
        ]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(720.), px(640.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let notification_list = cx.new(|cx| NotificationList::new(window, cx));
                    let shell = cx.new(|cx| {
                        ChatAppShell::new(notification_list, &settings_store, window, cx)
                    });

                    // Root is required by gpui-component for notifications and dialogs.
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
