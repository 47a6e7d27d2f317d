use cs_config::ShellSettings;
use cs_core::ShellError;
use cs_core::ShellResult;
use cs_host::IconImage;
use cs_host::NavAction;
use cs_host::ToolbarIcons;
use cs_shell::ShellAssets;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::warn;

const MAX_ICON_PIXELS: usize = 1024 * 1024;

const BUILTIN_WINDOW_ICON: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64">
<rect x="4" y="4" width="56" height="56" rx="12" fill="#1f4e8c"/>
<path d="M20 22h24v6H20zM20 32h24v6H20zM20 42h14v6H20z" fill="#ffffff"/>
</svg>"##;

const BUILTIN_BACK: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24">
<path d="M15 5l-7 7 7 7" fill="none" stroke="#333333" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
</svg>"##;

const BUILTIN_FORWARD: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24">
<path d="M9 5l7 7-7 7" fill="none" stroke="#333333" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
</svg>"##;

const BUILTIN_REFRESH: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24">
<path d="M19 12a7 7 0 1 1-2.05-4.95" fill="none" stroke="#333333" stroke-width="2.5" stroke-linecap="round"/>
<path d="M19 4v5h-5" fill="none" stroke="#333333" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
</svg>"##;

const BUILTIN_HOME: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24">
<path d="M4 11l8-7 8 7M6 10v10h12V10" fill="none" stroke="#333333" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/>
</svg>"##;

/// Where one icon came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOrigin {
    BuiltIn,
    File(PathBuf),
    /// The configured file could not be used; the built-in icon replaced it.
    Fallback { path: PathBuf, error: String },
    /// Neither the file nor the built-in icon decoded.
    Missing,
}

impl fmt::Display for AssetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn => f.write_str("built-in"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Fallback { path, error } => {
                write!(f, "built-in ({} unusable: {error})", path.display())
            }
            Self::Missing => f.write_str("none"),
        }
    }
}

/// Per-icon provenance, printed by the `config` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub window_icon: AssetOrigin,
    pub toolbar: Vec<(NavAction, AssetOrigin)>,
}

/// Decodes the window icon and toolbar icons named in `settings`,
/// substituting built-in artwork for anything missing or undecodable.
pub fn load_assets(settings: &ShellSettings) -> (ShellAssets, AssetReport) {
    let (window_icon, window_origin) =
        load_icon(settings.window_icon.as_deref(), BUILTIN_WINDOW_ICON, "window icon");

    let mut toolbar_icons = ToolbarIcons::new();
    let mut toolbar = Vec::with_capacity(NavAction::ALL.len());
    for action in NavAction::ALL {
        let path = settings
            .toolbar_icons
            .as_deref()
            .map(|dir| dir.join(format!("{}.svg", action.as_str())));
        let (icon, origin) = load_icon(path.as_deref(), builtin_toolbar_svg(action), action.as_str());
        if let Some(icon) = icon {
            toolbar_icons.insert(action, icon);
        }
        toolbar.push((action, origin));
    }

    (
        ShellAssets {
            window_icon,
            toolbar_icons,
        },
        AssetReport {
            window_icon: window_origin,
            toolbar,
        },
    )
}

fn load_icon(path: Option<&Path>, builtin: &str, label: &str) -> (Option<IconImage>, AssetOrigin) {
    let Some(path) = path else {
        return builtin_icon(builtin, label, AssetOrigin::BuiltIn);
    };

    match read_asset(path).and_then(|body| decode_icon(path, &body)) {
        Ok(icon) => {
            debug!(label, path = %path.display(), width = icon.width, height = icon.height, "icon loaded");
            (Some(icon), AssetOrigin::File(path.to_path_buf()))
        }
        Err(error) => {
            warn!(label, path = %path.display(), %error, "icon unusable, using built-in");
            builtin_icon(
                builtin,
                label,
                AssetOrigin::Fallback {
                    path: path.to_path_buf(),
                    error: error.message,
                },
            )
        }
    }
}

fn builtin_icon(svg: &str, label: &str, origin: AssetOrigin) -> (Option<IconImage>, AssetOrigin) {
    match render_svg(svg.as_bytes()) {
        Ok(icon) => (Some(icon), origin),
        Err(error) => {
            warn!(label, %error, "built-in icon failed to render");
            (None, AssetOrigin::Missing)
        }
    }
}

fn builtin_toolbar_svg(action: NavAction) -> &'static str {
    match action {
        NavAction::Back => BUILTIN_BACK,
        NavAction::Forward => BUILTIN_FORWARD,
        NavAction::Refresh => BUILTIN_REFRESH,
        NavAction::Home => BUILTIN_HOME,
    }
}

fn read_asset(path: &Path) -> ShellResult<Vec<u8>> {
    std::fs::read(path).map_err(|error| {
        ShellError::new(
            "assets.read_failed",
            format!("failed to read {}: {error}", path.display()),
        )
    })
}

fn decode_icon(path: &Path, body: &[u8]) -> ShellResult<IconImage> {
    let is_svg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg {
        render_svg(body)
    } else {
        decode_raster(body)
    }
}

/// Decodes a PNG into RGBA8.
pub fn decode_raster(body: &[u8]) -> ShellResult<IconImage> {
    let decoded = image::load_from_memory(body)
        .map_err(|error| ShellError::new("assets.decode_failed", error.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    check_pixels(width, height)?;
    Ok(IconImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// Rasterizes an SVG document at its intrinsic size.
pub fn render_svg(body: &[u8]) -> ShellResult<IconImage> {
    let options = resvg::usvg::Options::default();
    let tree = resvg::usvg::Tree::from_data(body, &options)
        .map_err(|error| ShellError::new("assets.decode_failed", error.to_string()))?;
    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());
    check_pixels(width, height)?;

    let Some(mut pixmap) = resvg::tiny_skia::Pixmap::new(width, height) else {
        return Err(ShellError::new(
            "assets.decode_failed",
            format!("cannot allocate a {width}x{height} pixmap"),
        ));
    };
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );
    Ok(IconImage {
        width,
        height,
        rgba: pixmap.data().to_vec(),
    })
}

fn check_pixels(width: u32, height: u32) -> ShellResult<()> {
    let pixels = usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h));
    match pixels {
        Some(pixels) if pixels > 0 && pixels <= MAX_ICON_PIXELS => Ok(()),
        _ => Err(ShellError::new(
            "assets.size_invalid",
            format!("icon size {width}x{height} is empty or too large"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::AssetOrigin;
    use super::decode_raster;
    use super::load_assets;
    use super::render_svg;
    use cs_config::ShellSettings;
    use cs_host::NavAction;
    use pretty_assertions::assert_eq;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let buffer = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap_or_else(|_| unreachable!());
        out.into_inner()
    }

    #[test]
    fn defaults_use_builtin_artwork() {
        let (assets, report) = load_assets(&ShellSettings::default());

        let icon = assets.window_icon.unwrap_or_else(|| unreachable!());
        assert_eq!((icon.width, icon.height), (64, 64));
        assert_eq!(icon.rgba.len(), 64 * 64 * 4);
        assert_eq!(report.window_icon, AssetOrigin::BuiltIn);
        assert_eq!(assets.toolbar_icons.len(), NavAction::ALL.len());
        assert!(report.toolbar.iter().all(|(_, origin)| *origin == AssetOrigin::BuiltIn));
    }

    #[test]
    fn configured_png_and_svg_files_are_decoded() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let icon_path = dir.path().join("icon.png");
        std::fs::write(&icon_path, png_bytes(16, 8)).unwrap_or_else(|_| unreachable!());
        let home_path = dir.path().join("home.svg");
        std::fs::write(
            &home_path,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32"><rect width="32" height="32" fill="red"/></svg>"#,
        )
        .unwrap_or_else(|_| unreachable!());

        let settings = ShellSettings {
            window_icon: Some(icon_path.clone()),
            toolbar_icons: Some(dir.path().to_path_buf()),
            ..ShellSettings::default()
        };
        let (assets, report) = load_assets(&settings);

        let icon = assets.window_icon.unwrap_or_else(|| unreachable!());
        assert_eq!((icon.width, icon.height), (16, 8));
        assert_eq!(report.window_icon, AssetOrigin::File(icon_path));

        let home = assets
            .toolbar_icons
            .get(&NavAction::Home)
            .unwrap_or_else(|| unreachable!());
        assert_eq!(home.width, 32);
        let back_origin = report
            .toolbar
            .iter()
            .find(|(action, _)| *action == NavAction::Back)
            .map(|(_, origin)| origin.clone());
        assert!(matches!(back_origin, Some(AssetOrigin::Fallback { .. })));
        assert_eq!(assets.toolbar_icons.len(), NavAction::ALL.len());
    }

    #[test]
    fn undecodable_icon_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let icon_path = dir.path().join("icon.png");
        std::fs::write(&icon_path, b"not a png").unwrap_or_else(|_| unreachable!());

        let settings = ShellSettings {
            window_icon: Some(icon_path.clone()),
            ..ShellSettings::default()
        };
        let (assets, report) = load_assets(&settings);

        assert_eq!(
            assets.window_icon.map(|icon| (icon.width, icon.height)),
            Some((64, 64))
        );
        match report.window_icon {
            AssetOrigin::Fallback { path, .. } => assert_eq!(path, icon_path),
            other => panic!("unexpected origin {other:?}"),
        }
    }

    #[test]
    fn decoders_reject_garbage() {
        assert_eq!(
            decode_raster(b"garbage").err().map(|e| e.code),
            Some("assets.decode_failed")
        );
        assert_eq!(
            render_svg(b"<svg").err().map(|e| e.code),
            Some("assets.decode_failed")
        );
    }
}
