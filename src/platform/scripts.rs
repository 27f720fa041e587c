//! JavaScript snippets evaluated in the page.
//!
//! Every selector is embedded as a JSON string literal, so configured
//! selectors may contain any quote characters.

use crate::scraper::js_string;

/// Attribute stamped on every scanned feed element
pub const REF_ATTR: &str = "data-crawl-ref";

/// Stamp each element matching `item` with a stable reference and return
/// `[{ref, title, url}]` in document order.
pub fn scan_script(item: &str, title: &str, link: &str) -> String {
    let item = js_string(item);
    let title = js_string(title);
    let link = js_string(link);
    let attr = js_string(REF_ATTR);

    format!(
        r#"
        (() => {{
            window.__crawlRef = window.__crawlRef || 0;
            const out = [];
            document.querySelectorAll({item}).forEach(el => {{
                let ref = el.getAttribute({attr});
                if (!ref) {{
                    window.__crawlRef += 1;
                    ref = String(window.__crawlRef);
                    el.setAttribute({attr}, ref);
                }}
                const titleEl = el.querySelector({title}) || el;
                const title = (titleEl.innerText || '').trim().slice(0, 200);
                const linkEl = el.querySelector({link});
                const url = linkEl && linkEl.href ? linkEl.href : null;
                out.push({{ ref, title, url }});
            }});
            return out;
        }})()
        "#
    )
}

/// True once any of `selectors` matches an element with non-empty text.
pub fn any_text_script(selectors: &[&str]) -> String {
    let list = js_list(selectors);
    format!(
        r#"
        (() => {{
            return [{list}].some(sel => {{
                const el = document.querySelector(sel);
                return !!el && (el.innerText || '').trim().length > 0;
            }});
        }})()
        "#
    )
}

/// True when nothing matches `selector`.
pub fn absent_script(selector: &str) -> String {
    format!("document.querySelector({}) === null", js_string(selector))
}

/// True when an element matching `selector` has scrolled into the viewport.
pub fn reached_script(selector: &str) -> String {
    let selector = js_string(selector);
    format!(
        r#"
        (() => {{
            const el = document.querySelector({selector});
            if (!el) return false;
            return el.getBoundingClientRect().top < window.innerHeight;
        }})()
        "#
    )
}

/// Click every element matching `target` inside `scope`; returns the count.
pub fn click_all_script(scope: &str, target: &str) -> String {
    let scope = js_string(scope);
    let target = js_string(target);
    format!(
        r#"
        (() => {{
            const root = document.querySelector({scope});
            if (!root) return 0;
            let clicked = 0;
            root.querySelectorAll({target}).forEach(el => {{
                try {{ el.click(); clicked += 1; }} catch (e) {{}}
            }});
            return clicked;
        }})()
        "#
    )
}

/// Distinct non-empty texts of `selector`, optionally inside `scope`.
pub fn texts_script(scope: Option<&str>, selector: &str, limit: usize) -> String {
    let root = root_expr(scope);
    let selector = js_string(selector);
    format!(
        r#"
        (() => {{
            const root = {root};
            if (!root) return [];
            const seen = new Set();
            root.querySelectorAll({selector}).forEach(el => {{
                const text = (el.innerText || '').trim();
                if (text) seen.add(text);
            }});
            return Array.from(seen).slice(0, {limit});
        }})()
        "#
    )
}

/// Which detail fields to read, and from where
#[derive(Debug, Clone, Copy)]
pub struct DetailQuery<'a> {
    /// Restrict lookups to this element; the whole document otherwise
    pub scope: Option<&'a str>,
    /// Without a title element the first line of the text is used
    pub title: Option<&'a str>,
    pub text: &'a str,
    pub link: &'a str,
    pub time: &'a str,
    pub images: &'a str,
    /// Use `location.href` when no link element is found
    pub page_url_fallback: bool,
}

/// Read a detail view into `{title, text, url, published_at, image_urls}`.
pub fn detail_script(query: &DetailQuery<'_>) -> String {
    let root = root_expr(query.scope);
    let title = query.title.map(js_string).unwrap_or_else(|| "null".to_string());
    let text = js_string(query.text);
    let link = js_string(query.link);
    let time = js_string(query.time);
    let images = js_string(query.images);
    let fallback = query.page_url_fallback;

    format!(
        r#"
        (() => {{
            const root = {root};
            if (!root) return null;
            const pick = sel => {{
                for (const s of sel.split(',')) {{
                    const el = root.querySelector(s.trim());
                    if (el && (el.innerText || '').trim()) return el;
                }}
                return null;
            }};
            const textEl = pick({text});
            const text = textEl ? textEl.innerText.trim() : '';
            const titleSel = {title};
            let title = '';
            if (titleSel) {{
                const titleEl = pick(titleSel);
                title = titleEl ? titleEl.innerText.trim() : '';
            }} else {{
                title = (text.split('\n').find(l => l.trim()) || '').trim().slice(0, 50);
            }}
            const linkEl = root.querySelector({link});
            let url = linkEl && linkEl.href ? linkEl.href : null;
            if (!url && {fallback}) url = location.href;
            const timeEl = root.querySelector({time});
            const published_at = timeEl ? (timeEl.innerText || '').trim() || null : null;
            const image_urls = Array.from(root.querySelectorAll({images}))
                .map(img => img.currentSrc || img.src || img.getAttribute('data-src') || '')
                .filter(src => src);
            return {{ title, text, url, published_at, image_urls }};
        }})()
        "#
    )
}

/// Comment texts, end-marker presence and scroll state of a container.
pub fn comment_state_script(container: &str, comment: &str, end_marker: &str) -> String {
    let container = js_string(container);
    let comment = js_string(comment);
    let end_marker = js_string(end_marker);
    format!(
        r#"
        (() => {{
            const box = document.querySelector({container});
            if (!box) return {{ found: false, comments: [], end: false, bottom: true }};
            const comments = Array.from(document.querySelectorAll({comment}))
                .map(el => (el.innerText || '').trim())
                .filter(t => t);
            const end = document.querySelector({end_marker}) !== null;
            const bottom = box.scrollTop + box.clientHeight >= box.scrollHeight - 2;
            return {{ found: true, comments, end, bottom }};
        }})()
        "#
    )
}

/// Scroll a container by a fraction of its visible height.
pub fn scroll_container_script(container: &str, fraction: f64) -> String {
    let container = js_string(container);
    format!(
        r#"
        (() => {{
            const box = document.querySelector({container});
            if (!box) return false;
            box.scrollTop = box.scrollTop + Math.floor(box.clientHeight * {fraction});
            return true;
        }})()
        "#
    )
}

fn root_expr(scope: Option<&str>) -> String {
    match scope {
        Some(scope) => format!("document.querySelector({})", js_string(scope)),
        None => "document".to_string(),
    }
}

fn js_list(items: &[&str]) -> String {
    items.iter().map(|s| js_string(s)).collect::<Vec<_>>().join(", ")
}
