use scenedeck_panel::{PanelEvent, SceneTile};

pub fn format_tiles(tiles: &[SceneTile]) -> String {
    if tiles.is_empty() {
        return "No recent scenes.".to_string();
    }
    let mut lines = Vec::with_capacity(tiles.len() + 1);
    lines.push(format!("Quick load ({} scenes)", tiles.len()));
    for (index, tile) in tiles.iter().enumerate() {
        lines.push(format_tile(index + 1, tile));
    }
    lines.join("\n")
}

pub fn format_tile(position: usize, tile: &SceneTile) -> String {
    let cover = match &tile.cover {
        Some(uri) => format!("cover {} chars", uri.len()),
        None => "placeholder".to_string(),
    };
    format!(
        "{:>2}. {} [{}] saved {} ({}) -> {}",
        position, tile.title, tile.name, tile.date_label, cover, tile.path
    )
}

pub fn format_event(event: &PanelEvent) -> String {
    match event {
        PanelEvent::LoadScene { path } => format!("load requested: {path}"),
        PanelEvent::CoversUpdated { ids } => format!("covers received: {}", ids.join(", ")),
        PanelEvent::RequestOverdue { kind, path } => {
            format!("no answer from host yet for {kind:?} of {path}")
        }
    }
}
