use std::rc::Rc;

use tracing::{debug, trace};

use crate::dom::{Dom, FileHandle, NodeId, is_file_input, is_submit_control, truncate_chars};
use crate::events::{Event, HandlerFn, Listener, ListenerId, ListenerStore};
use crate::html::parse_html;
use crate::{Error, Result};

pub(crate) type TimerCallback = Rc<dyn Fn(&mut Page) -> Result<()>>;

struct ScheduledTask {
    id: i64,
    due_at: i64,
    order: i64,
    callback: TimerCallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
}

pub struct Page {
    dom: Dom,
    listeners: ListenerStore,
    task_queue: Vec<ScheduledTask>,
    now_ms: i64,
    timer_step_limit: usize,
    next_timer_id: i64,
    next_task_order: i64,
    next_listener_id: u64,
    picker_opens: usize,
    form_submissions: usize,
    native_drop_opens: usize,
}

impl Page {
    pub fn from_html(html: &str) -> Result<Self> {
        let dom = parse_html(html)?;
        Ok(Self {
            dom,
            listeners: ListenerStore::default(),
            task_queue: Vec::new(),
            now_ms: 0,
            timer_step_limit: 10_000,
            next_timer_id: 1,
            next_task_order: 0,
            next_listener_id: 1,
            picker_opens: 0,
            form_submissions: 0,
            native_drop_opens: 0,
        })
    }

    // Queries

    pub fn find(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub fn try_find(&self, selector: &str) -> Result<Option<NodeId>> {
        self.dom.query_selector(selector)
    }

    pub fn try_find_within(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.dom.query_selector_from(root, selector)
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.dom.query_selector_all(selector)
    }

    // Node state

    pub fn text_content(&self, node: NodeId) -> String {
        self.dom.text_content(node)
    }

    pub fn set_text_content(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.dom.set_text_content(node, value)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.dom.attr(node, name)
    }

    pub fn value(&self, node: NodeId) -> Result<String> {
        self.dom.value(node)
    }

    pub fn files(&self, node: NodeId) -> Result<Vec<FileHandle>> {
        Ok(self.dom.files(node)?.to_vec())
    }

    pub fn set_files(&mut self, node: NodeId, files: Vec<FileHandle>) -> Result<()> {
        self.dom.set_files(node, files)
    }

    pub fn class_contains(&self, node: NodeId, class_name: &str) -> Result<bool> {
        self.dom.class_contains(node, class_name)
    }

    pub fn class_add(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.dom.class_add(node, class_name)
    }

    pub fn class_remove(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.dom.class_remove(node, class_name)
    }

    pub fn style(&self, node: NodeId, prop: &str) -> Result<String> {
        self.dom.style_get(node, prop)
    }

    pub fn set_style(&mut self, node: NodeId, prop: &str, value: &str) -> Result<()> {
        self.dom.style_set(node, prop, value)
    }

    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        self.dom.remove_node(node)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.dom.is_connected(node)
    }

    // Listener registration

    pub fn on<F>(&mut self, node: NodeId, event_type: &str, handler: F) -> ListenerId
    where
        F: Fn(&mut Page, &mut Event) -> Result<()> + 'static,
    {
        self.add_listener(node, event_type, false, handler)
    }

    pub fn add_listener<F>(
        &mut self,
        node: NodeId,
        event_type: &str,
        capture: bool,
        handler: F,
    ) -> ListenerId
    where
        F: Fn(&mut Page, &mut Event) -> Result<()> + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        let handler: HandlerFn = Rc::new(handler);
        self.listeners.add(
            node,
            event_type.to_string(),
            Listener {
                id,
                capture,
                handler,
            },
        );
        trace!(event_type, capture, "listener added");
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.total()
    }

    // Synthetic user gestures

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.find(selector)?;
        self.click_node(target)
    }

    pub fn click_node(&mut self, target: NodeId) -> Result<()> {
        if self.dom.disabled(target) {
            return Ok(());
        }

        let outcome = self.dispatch_to(Event::new("click", target))?;
        if outcome.default_prevented() {
            return Ok(());
        }

        if is_file_input(&self.dom, target) {
            self.picker_opens += 1;
            debug!("native file picker opened");
            return Ok(());
        }

        if is_submit_control(&self.dom, target) {
            if let Some(form) = self.resolve_form_for_submit(target) {
                self.submit_form(form)?;
            }
        }

        Ok(())
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.find(selector)?;
        if self.dom.disabled(target) || self.dom.readonly(target) {
            return Ok(());
        }

        let tag = self
            .dom
            .tag_name(target)
            .ok_or_else(|| Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: "non-element".into(),
            })?
            .to_ascii_lowercase();

        if tag != "input" && tag != "textarea" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: tag,
            });
        }

        self.dom.set_value(target, text)?;
        self.dispatch_to(Event::new("input", target))?;
        Ok(())
    }

    pub fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.find(selector)?;
        let tag = self
            .dom
            .tag_name(target)
            .unwrap_or_default()
            .to_ascii_lowercase();
        if tag != "select" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: tag,
            });
        }
        if self.dom.disabled(target) {
            return Ok(());
        }

        let current = self.dom.value(target)?;
        self.dom.set_value(target, value)?;
        if self.dom.value(target)? != current {
            self.dispatch_to(Event::new("input", target))?;
            self.dispatch_to(Event::new("change", target))?;
        }
        Ok(())
    }

    // Simulates picking files through the native dialog. An empty list models
    // the user clearing the selection.
    pub fn choose_files(&mut self, selector: &str, files: Vec<FileHandle>) -> Result<()> {
        let target = self.find(selector)?;
        if !is_file_input(&self.dom, target) {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=file]".into(),
                actual: self.dom.tag_name(target).unwrap_or("non-element").into(),
            });
        }
        if self.dom.disabled(target) {
            return Ok(());
        }

        self.dom.set_files(target, files)?;
        self.dispatch_to(Event::new("change", target))?;
        Ok(())
    }

    pub fn drag_over(&mut self, selector: &str) -> Result<()> {
        let target = self.find(selector)?;
        self.dispatch_to(Event::new("dragover", target))?;
        Ok(())
    }

    pub fn drag_leave(&mut self, selector: &str) -> Result<()> {
        let target = self.find(selector)?;
        self.dispatch_to(Event::new("dragleave", target))?;
        Ok(())
    }

    pub fn drop_files(&mut self, selector: &str, files: Vec<FileHandle>) -> Result<()> {
        let target = self.find(selector)?;
        let outcome = self.dispatch_to(Event::with_files("drop", target, files))?;
        if !outcome.default_prevented() {
            // Unhandled drops navigate the browser to the dropped file.
            self.native_drop_opens += 1;
            debug!("unhandled drop, browser would open the file");
        }
        Ok(())
    }

    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.find(selector)?;

        let form = if self
            .dom
            .tag_name(target)
            .map(|t| t.eq_ignore_ascii_case("form"))
            .unwrap_or(false)
        {
            Some(target)
        } else {
            self.resolve_form_for_submit(target)
        };

        if let Some(form) = form {
            self.submit_form(form)?;
        }
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event_type: &str) -> Result<()> {
        let target = self.find(selector)?;
        self.dispatch_to(Event::new(event_type, target))?;
        Ok(())
    }

    fn submit_form(&mut self, form: NodeId) -> Result<()> {
        let outcome = self.dispatch_to(Event::new("submit", form))?;
        if !outcome.default_prevented() {
            self.form_submissions += 1;
            debug!("form submission proceeds");
        }
        Ok(())
    }

    fn resolve_form_for_submit(&self, target: NodeId) -> Option<NodeId> {
        if self
            .dom
            .tag_name(target)
            .map(|t| t.eq_ignore_ascii_case("form"))
            .unwrap_or(false)
        {
            return Some(target);
        }
        self.dom.find_ancestor_by_tag(target, "form")
    }

    // Default-action observability

    pub fn picker_opens(&self) -> usize {
        self.picker_opens
    }

    pub fn form_submissions(&self) -> usize {
        self.form_submissions
    }

    pub fn native_drop_opens(&self) -> usize {
        self.native_drop_opens
    }

    // Dispatch

    fn dispatch_to(&mut self, mut event: Event) -> Result<Event> {
        trace!(event_type = event.event_type(), "dispatch");

        let mut path = Vec::new();
        let mut cursor = Some(event.target());
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom.parent(node);
        }
        path.reverse();

        if path.is_empty() {
            return Ok(event);
        }

        // Capture phase.
        if path.len() >= 2 {
            for node in &path[..path.len() - 1] {
                event.set_current_target(*node);
                self.invoke_listeners(*node, &mut event, true)?;
                if event.propagation_stopped() {
                    return Ok(event);
                }
            }
        }

        // Target phase: capture listeners first.
        let target = event.target();
        event.set_current_target(target);
        self.invoke_listeners(target, &mut event, true)?;
        if event.propagation_stopped() {
            return Ok(event);
        }

        // Target phase: bubble listeners.
        self.invoke_listeners(target, &mut event, false)?;
        if event.propagation_stopped() {
            return Ok(event);
        }

        // Bubble phase.
        if path.len() >= 2 {
            for node in path[..path.len() - 1].iter().rev() {
                event.set_current_target(*node);
                self.invoke_listeners(*node, &mut event, false)?;
                if event.propagation_stopped() {
                    return Ok(event);
                }
            }
        }

        Ok(event)
    }

    fn invoke_listeners(&mut self, node: NodeId, event: &mut Event, capture: bool) -> Result<()> {
        let listeners = self.listeners.get(node, event.event_type(), capture);
        for listener in listeners {
            trace!(
                event_type = event.event_type(),
                capture,
                default_prevented = event.default_prevented(),
                "invoke listener"
            );
            (listener.handler)(self, event)?;
            if event.immediate_propagation_stopped() {
                break;
            }
        }
        Ok(())
    }

    // Timers

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn set_timeout<F>(&mut self, delay_ms: i64, callback: F) -> i64
    where
        F: Fn(&mut Page) -> Result<()> + 'static,
    {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        let due_at = self.now_ms.saturating_add(delay_ms.max(0));
        self.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            callback: Rc::new(callback),
        });
        trace!(id, due_at, "timer scheduled");
        id
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        let before = self.task_queue.len();
        self.task_queue.retain(|task| task.id != timer_id);
        before != self.task_queue.len()
    }

    pub fn clear_all_timers(&mut self) -> usize {
        let cleared = self.task_queue.len();
        self.task_queue.clear();
        trace!(cleared, "all timers cleared");
        cleared
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Timer(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        let ran = self.run_timer_queue(Some(self.now_ms), false)?;
        trace!(now_ms = self.now_ms, ran, "advance");
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.now_ms {
            return Err(Error::Timer(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.now_ms
            )));
        }
        self.now_ms = target_ms;
        let ran = self.run_timer_queue(Some(self.now_ms), false)?;
        trace!(now_ms = self.now_ms, ran, "advance_to");
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let ran = self.run_timer_queue(None, true)?;
        trace!(now_ms = self.now_ms, ran, "flush");
        Ok(())
    }

    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.next_task_index(None) else {
            return Ok(false);
        };

        let task = self.task_queue.remove(next_idx);
        if task.due_at > self.now_ms {
            self.now_ms = task.due_at;
        }
        self.execute_timer_task(task)?;
        Ok(true)
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        self.run_timer_queue(Some(self.now_ms), false)
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Timer(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.timer_step_limit = max_steps;
        Ok(())
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.next_task_index(due_limit) {
            steps += 1;
            if steps > self.timer_step_limit {
                return Err(Error::Timer(format!(
                    "flush exceeded max task steps (possible self-rescheduling timer): limit={}, now_ms={}, pending_tasks={}",
                    self.timer_step_limit,
                    self.now_ms,
                    self.task_queue.len()
                )));
            }
            let task = self.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.now_ms {
                self.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| {
                if let Some(limit) = due_limit {
                    task.due_at <= limit
                } else {
                    true
                }
            })
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }

    fn execute_timer_task(&mut self, task: ScheduledTask) -> Result<()> {
        trace!(
            id = task.id,
            due_at = task.due_at,
            now_ms = self.now_ms,
            "timer run"
        );
        (task.callback)(self)
    }

    // Assertions

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.find(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.find(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.find(selector)?;
        Ok(())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.find(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn node_snippet(&self, node: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node), 200)
    }
}
