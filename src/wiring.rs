use tracing::{debug, trace};

use crate::page::Page;
use crate::{FileHandle, Result};

pub const CLASS_SELECT_ID: &str = "class_id";
pub const UPLOAD_AREA_SELECTOR: &str = ".file-upload-area";
pub const FLASH_SELECTOR: &str = ".flash-message";
pub const HIGHLIGHT_CLASS: &str = "border-blue-500";
pub const FILE_SELECTED_PREFIX: &str = "已選擇文件: ";
pub const DROP_HINT: &str = "或將文件拖放到此處";
pub const FLASH_FADE_STYLE: &str = "opacity 0.5s ease";
pub const FLASH_LINGER_MS: i64 = 5000;
pub const FLASH_FADE_MS: i64 = 500;

// Installs all page behavior on a parsed page. Every feature checks that its
// elements exist and silently skips itself otherwise, so one markup variant
// never breaks the rest of the page.
pub fn wire_page(page: &mut Page) -> Result<()> {
    wire_class_select(page)?;
    wire_upload_zone(page)?;
    wire_form_guard(page)?;
    wire_flash_messages(page)?;
    debug!("page wired");
    Ok(())
}

// Extension point: selecting a class could fetch `/class/<id>/students_json`
// and refresh the list in place. The current routes render a full page per
// class, so the listener only observes the change.
fn wire_class_select(page: &mut Page) -> Result<()> {
    let Some(select) = page.try_find(&format!("#{CLASS_SELECT_ID}"))? else {
        return Ok(());
    };

    page.on(select, "change", move |page, _event| {
        let selected = page.value(select)?;
        if !selected.is_empty() {
            trace!(%selected, "class selection changed");
        }
        Ok(())
    });
    Ok(())
}

fn wire_upload_zone(page: &mut Page) -> Result<()> {
    let Some(area) = page.try_find(UPLOAD_AREA_SELECTOR)? else {
        return Ok(());
    };
    let Some(input) = page.try_find_within(area, "input[type=file]")? else {
        return Ok(());
    };
    let Some(feedback) = page.try_find_within(area, "p")? else {
        return Ok(());
    };

    // Clicking anywhere in the zone opens the picker through the input. A
    // click whose target is the input already does that natively.
    page.on(area, "click", move |page, event| {
        if event.target() == input {
            return Ok(());
        }
        page.click_node(input)
    });

    page.on(input, "change", move |page, _event| {
        let files = page.files(input)?;
        let text = match files.first() {
            Some(first) => format!("{FILE_SELECTED_PREFIX}{}", first.name),
            None => DROP_HINT.to_string(),
        };
        page.set_text_content(feedback, &text)
    });

    page.on(area, "dragover", move |page, event| {
        event.prevent_default();
        event.stop_propagation();
        page.class_add(area, HIGHLIGHT_CLASS)
    });

    page.on(area, "dragleave", move |page, event| {
        event.prevent_default();
        event.stop_propagation();
        page.class_remove(area, HIGHLIGHT_CLASS)
    });

    page.on(area, "drop", move |page, event| {
        event.prevent_default();
        event.stop_propagation();
        page.class_remove(area, HIGHLIGHT_CLASS)?;

        let dropped: Vec<FileHandle> = event.drag_files().to_vec();
        if dropped.is_empty() {
            return Ok(());
        }

        page.set_files(input, dropped)?;
        if let Some(first) = page.files(input)?.first() {
            let text = format!("{FILE_SELECTED_PREFIX}{}", first.name);
            page.set_text_content(feedback, &text)?;
        }
        Ok(())
    });

    Ok(())
}

// Extension point: client-side field validation would go here and call
// event.prevent_default() on invalid input. Server-side validation already
// covers every field, so submission is never blocked.
fn wire_form_guard(page: &mut Page) -> Result<()> {
    let Some(form) = page.try_find("form")? else {
        return Ok(());
    };

    page.on(form, "submit", move |_page, _event| {
        trace!("form submit observed");
        Ok(())
    });
    Ok(())
}

fn wire_flash_messages(page: &mut Page) -> Result<()> {
    for message in page.query_all(FLASH_SELECTOR)? {
        page.set_timeout(FLASH_LINGER_MS, move |page| {
            page.set_style(message, "transition", FLASH_FADE_STYLE)?;
            page.set_style(message, "opacity", "0")?;
            page.set_timeout(FLASH_FADE_MS, move |page| page.remove_node(message));
            Ok(())
        });
    }
    Ok(())
}
