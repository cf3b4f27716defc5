use page_harness::wiring::{DROP_HINT, FILE_SELECTED_PREFIX, HIGHLIGHT_CLASS};
use page_harness::{FileHandle, Page, Result, wire_page};

const UPLOAD_PAGE: &str = "\
    <div class='file-upload-area'>\
      <input type='file' name='attachment'>\
      <p>或將文件拖放到此處</p>\
    </div>";

fn wired(html: &str) -> Result<Page> {
    let mut page = Page::from_html(html)?;
    wire_page(&mut page)?;
    Ok(page)
}

#[test]
fn wiring_empty_page_attaches_nothing() -> Result<()> {
    let page = wired("<div id='content'>nothing to wire</div>")?;
    assert_eq!(page.listener_count(), 0);
    assert_eq!(page.pending_timers().len(), 0);
    assert!(page.dump_dom("#content")?.contains("id=\"content\""));
    Ok(())
}

#[test]
fn class_select_change_is_observed_without_side_effects() -> Result<()> {
    let mut page = wired(
        "<form action='/records'>\
           <select id='class_id' name='class_id'>\
             <option value=''>--</option>\
             <option value='3'>3C</option>\
           </select>\
         </form>",
    )?;

    assert_eq!(page.listener_count(), 2);
    page.select_option("#class_id", "3")?;
    page.assert_value("#class_id", "3")?;

    // The listener is a placeholder: no fetch, no submission, no DOM text.
    page.assert_text("option", "--")?;
    assert_eq!(page.form_submissions(), 0);
    Ok(())
}

#[test]
fn absent_class_select_skips_listener() -> Result<()> {
    let page = wired("<select id='other'><option value='1'>1</option></select>")?;
    assert_eq!(page.listener_count(), 0);
    Ok(())
}

#[test]
fn clicking_upload_zone_opens_picker() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    page.click(".file-upload-area")?;
    assert_eq!(page.picker_opens(), 1);
    Ok(())
}

#[test]
fn clicking_input_directly_opens_picker_once() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    page.click(".file-upload-area input[type=file]")?;
    assert_eq!(page.picker_opens(), 1);
    Ok(())
}

#[test]
fn upload_zone_without_input_is_inert() -> Result<()> {
    let mut page = wired("<div class='file-upload-area'><p>hint</p></div>")?;
    assert_eq!(page.listener_count(), 0);
    page.click(".file-upload-area")?;
    assert_eq!(page.picker_opens(), 0);
    Ok(())
}

#[test]
fn upload_zone_without_feedback_is_inert() -> Result<()> {
    let mut page = wired("<div class='file-upload-area'><input type='file'></div>")?;
    assert_eq!(page.listener_count(), 0);
    page.click(".file-upload-area")?;
    assert_eq!(page.picker_opens(), 0);
    Ok(())
}

#[test]
fn choosing_a_file_shows_its_name() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    page.choose_files(
        ".file-upload-area input[type=file]",
        vec![FileHandle::new("成績單.xlsx", 20_480)],
    )?;
    page.assert_text(
        ".file-upload-area p",
        &format!("{FILE_SELECTED_PREFIX}成績單.xlsx"),
    )?;
    Ok(())
}

#[test]
fn clearing_selection_restores_hint() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    let input = ".file-upload-area input[type=file]";
    page.choose_files(input, vec![FileHandle::new("report.pdf", 1_024)])?;
    page.choose_files(input, Vec::new())?;
    page.assert_text(".file-upload-area p", DROP_HINT)?;
    Ok(())
}

#[test]
fn dragover_highlights_and_dragleave_clears() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    let area = page.find(".file-upload-area")?;

    page.drag_over(".file-upload-area")?;
    assert!(page.class_contains(area, HIGHLIGHT_CLASS)?);

    // dragover repeats while hovering; the class stays singular.
    page.drag_over(".file-upload-area")?;
    assert_eq!(
        page.attr(area, "class").unwrap(),
        format!("file-upload-area {HIGHLIGHT_CLASS}")
    );

    page.drag_leave(".file-upload-area")?;
    assert!(!page.class_contains(area, HIGHLIGHT_CLASS)?);
    Ok(())
}

#[test]
fn dropping_a_file_fills_input_and_feedback() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    let area = page.find(".file-upload-area")?;
    let input = page.find(".file-upload-area input[type=file]")?;

    page.drag_over(".file-upload-area")?;
    page.drop_files(
        ".file-upload-area",
        vec![FileHandle::new("photo.png", 88_000)],
    )?;

    assert_eq!(
        page.files(input)?,
        vec![FileHandle::new("photo.png", 88_000)]
    );
    page.assert_text(
        ".file-upload-area p",
        &format!("{FILE_SELECTED_PREFIX}photo.png"),
    )?;
    assert!(!page.class_contains(area, HIGHLIGHT_CLASS)?);
    // The handler prevented the browser's open-the-file default.
    assert_eq!(page.native_drop_opens(), 0);
    Ok(())
}

#[test]
fn multi_file_drop_keeps_all_files_but_names_the_first() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    let input = page.find(".file-upload-area input[type=file]")?;

    page.drop_files(
        ".file-upload-area",
        vec![
            FileHandle::new("a.csv", 10),
            FileHandle::new("b.csv", 20),
        ],
    )?;

    assert_eq!(page.files(input)?.len(), 2);
    page.assert_text(".file-upload-area p", &format!("{FILE_SELECTED_PREFIX}a.csv"))?;
    Ok(())
}

#[test]
fn empty_drop_changes_nothing_but_highlight() -> Result<()> {
    let mut page = wired(UPLOAD_PAGE)?;
    let area = page.find(".file-upload-area")?;
    let input = page.find(".file-upload-area input[type=file]")?;

    page.drag_over(".file-upload-area")?;
    page.drop_files(".file-upload-area", Vec::new())?;

    assert!(page.files(input)?.is_empty());
    page.assert_text(".file-upload-area p", DROP_HINT)?;
    assert!(!page.class_contains(area, HIGHLIGHT_CLASS)?);
    Ok(())
}

#[test]
fn drop_outside_any_zone_hits_browser_default() -> Result<()> {
    let mut page = wired("<div id='content'>plain page</div>")?;
    page.drop_files("#content", vec![FileHandle::new("x.txt", 1)])?;
    assert_eq!(page.native_drop_opens(), 1);
    Ok(())
}

#[test]
fn form_submission_is_not_blocked() -> Result<()> {
    let mut page = wired(
        "<form action='/records/new' method='post'>\
           <input type='date' name='record_date'>\
           <textarea name='note'>observed in class</textarea>\
           <button type='submit'>Save</button>\
         </form>",
    )?;

    page.type_text("input[type=date]", "2026-08-29")?;
    page.assert_value("textarea", "observed in class")?;

    page.click("button")?;
    assert_eq!(page.form_submissions(), 1);

    page.submit("form")?;
    assert_eq!(page.form_submissions(), 2);
    Ok(())
}

#[test]
fn wiring_only_first_form() -> Result<()> {
    let mut page = wired(
        "<form id='first'></form><form id='second'></form>",
    )?;
    assert_eq!(page.listener_count(), 1);
    page.submit("#second")?;
    page.submit("#first")?;
    // Both submit fine; only the first carries the interceptor.
    assert_eq!(page.form_submissions(), 2);
    Ok(())
}
