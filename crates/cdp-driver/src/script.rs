//! Page-side half of the driver.
//!
//! Every port call evaluates [`PAGE_RUNTIME`] with one request object. The
//! runtime keeps a per-document element table on `window.__formpilot`;
//! table indices become handle slots and the table token identifies the
//! document, so a new token means a new page load.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DriverError;

pub const PAGE_RUNTIME: &str = r#"function (req) {
  var fp = window.__formpilot;
  if (!fp) {
    fp = window.__formpilot = {
      token: Math.random().toString(36).slice(2) + Date.now().toString(36),
      els: []
    };
  }
  function reply(status, body) {
    body = body || {};
    body.status = status;
    body.token = fp.token;
    body.url = String(location.href);
    return body;
  }
  function fail(kind, message) {
    var err = new Error(message);
    err.fpKind = kind;
    return err;
  }
  function put(el) {
    var i = fp.els.indexOf(el);
    if (i < 0) {
      fp.els.push(el);
      i = fp.els.length - 1;
    }
    return i;
  }
  function resolve(slot) {
    var el = fp.els[slot];
    if (!el) throw fail('unknown', 'no element in slot ' + slot);
    if (!el.isConnected) throw fail('stale', 'element left the document');
    return el;
  }
  function collapse(text) {
    return String(text || '').replace(/\s+/g, ' ').trim();
  }
  function typeOf(el) {
    var tag = el.tagName.toLowerCase();
    if (tag === 'input') return (el.getAttribute('type') || 'text').toLowerCase();
    if (tag === 'button') return (el.getAttribute('type') || 'submit').toLowerCase();
    return null;
  }
  function editable(el) {
    var v = el.getAttribute('contenteditable');
    return v !== null && v.toLowerCase() !== 'false';
  }
  function inputLike(el) {
    var tag = el.tagName.toLowerCase();
    if (tag === 'select' || tag === 'textarea') return true;
    if (tag === 'input') return ['hidden', 'submit', 'button', 'reset', 'image'].indexOf(typeOf(el)) < 0;
    return editable(el);
  }
  function buttonLike(el) {
    var tag = el.tagName.toLowerCase();
    if (tag === 'button') return true;
    if (tag === 'input') return ['submit', 'button', 'image'].indexOf(typeOf(el)) >= 0;
    return (el.getAttribute('role') || '').toLowerCase() === 'button';
  }
  function readValue(el) {
    if (editable(el)) return el.textContent || '';
    return el.value === undefined || el.value === null ? '' : String(el.value);
  }
  function labelOf(el) {
    var text = function (n) { return n ? collapse(n.textContent) : ''; };
    if (el.id) {
      var byFor = Array.prototype.find.call(document.getElementsByTagName('label'), function (l) {
        return l.htmlFor === el.id;
      });
      if (text(byFor)) return text(byFor);
    }
    var by = el.getAttribute('aria-labelledby');
    if (by) {
      var parts = by.split(/\s+/).map(function (id) { return text(document.getElementById(id)); }).filter(Boolean);
      if (parts.length) return parts.join(' ');
    }
    var wrap = el.closest('label');
    if (text(wrap)) return text(wrap);
    var prev = el.previousElementSibling;
    if (prev && /^(LABEL|SPAN)$/.test(prev.tagName) && text(prev)) return text(prev);
    return null;
  }
  function valueDescriptor(el) {
    var proto = Object.getPrototypeOf(el);
    while (proto) {
      var d = Object.getOwnPropertyDescriptor(proto, 'value');
      if (d) return d;
      proto = Object.getPrototypeOf(proto);
    }
    return null;
  }
  function reactProps(el) {
    for (var key in el) {
      if (key.indexOf('__reactProps$') === 0) return el[key];
    }
    return null;
  }
  function makeEvent(a) {
    var init = { bubbles: true, cancelable: true, composed: true };
    switch (a.kind) {
      case 'keydown': case 'keypress': case 'keyup':
        init.key = a.key || '';
        return new KeyboardEvent(a.kind, init);
      case 'input':
        if (a.data !== null && a.data !== undefined) {
          init.data = a.data;
          init.inputType = 'insertText';
        }
        return new InputEvent('input', init);
      case 'focus': case 'blur': case 'focusout':
        return new FocusEvent(a.kind, init);
      case 'pointerdown': case 'pointerup':
        return new PointerEvent(a.kind, init);
      case 'mousedown': case 'mouseup': case 'click':
        return new MouseEvent(a.kind, init);
      default:
        return new Event(a.kind, init);
    }
  }
  function bytes(b64) {
    var raw = atob(b64);
    var out = new Uint8Array(raw.length);
    for (var i = 0; i < raw.length; i++) out[i] = raw.charCodeAt(i);
    return out;
  }

  var ops = {
    ping: function () { return null; },
    query_css: function (scope, a) {
      var found;
      try { found = (scope || document).querySelectorAll(a.selector); }
      catch (e) { throw fail('selector', e.message); }
      return Array.prototype.map.call(found, put);
    },
    query_path: function (scope, a) {
      var snap;
      try {
        snap = document.evaluate(a.expr, scope || document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      } catch (e) { throw fail('path', e.message); }
      var out = [];
      for (var i = 0; i < snap.snapshotLength; i++) {
        var n = snap.snapshotItem(i);
        if (n.nodeType === 1) out.push(put(n));
      }
      return out;
    },
    input_like: function (scope) {
      var found = (scope || document).querySelectorAll('input, select, textarea, [contenteditable]');
      return Array.prototype.filter.call(found, inputLike).map(put);
    },
    button_like: function (scope) {
      var found = (scope || document).querySelectorAll('button, input, [role]');
      return Array.prototype.filter.call(found, buttonLike).map(put);
    },
    describe: function (el) {
      var attrs = {};
      Array.prototype.forEach.call(el.attributes, function (at) { attrs[at.name.toLowerCase()] = at.value; });
      var attr = function (name) { return el.getAttribute(name); };
      return {
        tag: el.tagName.toLowerCase(),
        input_type: typeOf(el),
        name: attr('name'),
        id: attr('id'),
        placeholder: attr('placeholder'),
        aria_label: attr('aria-label'),
        autocomplete: attr('autocomplete'),
        classes: Array.prototype.slice.call(el.classList),
        attributes: attrs,
        disabled: el.hasAttribute('disabled'),
        readonly: el.hasAttribute('readonly'),
        aria_disabled: (attr('aria-disabled') || '').toLowerCase() === 'true',
        required: el.hasAttribute('required') || (attr('aria-required') || '').toLowerCase() === 'true'
      };
    },
    computed_style: function (el) {
      var s = getComputedStyle(el);
      var opacity = parseFloat(s.opacity);
      return { display: s.display, visibility: s.visibility, opacity: isNaN(opacity) ? 1 : opacity };
    },
    bounding_box: function (el) {
      var r = el.getBoundingClientRect();
      return { x: r.x, y: r.y, width: r.width, height: r.height };
    },
    parent: function (el) { return el.parentElement ? put(el.parentElement) : null; },
    children: function (el) { return Array.prototype.map.call(el.children, put); },
    label_text: labelOf,
    text_content: function (el) { return collapse(el.textContent); },
    visible_text: function () { return document.body ? document.body.innerText : ''; },
    read_value: readValue,
    is_checked: function (el) { return !!el.checked; },
    options: function (el) {
      if (!el.options) throw fail('unsupported', 'not a select');
      return Array.prototype.map.call(el.options, function (o, i) {
        return { index: i, value: o.value, text: collapse(o.text), selected: o.selected, disabled: o.disabled };
      });
    },
    file_count: function (el) { return el.files ? el.files.length : 0; },
    validation_message: function (el) { return el.validationMessage || null; },
    binding: function (el) {
      var props = reactProps(el);
      if (props && typeof props.onChange === 'function') return { kind: 'framework', handler: 'react:onChange' };
      var d = valueDescriptor(el);
      return d && d.set ? { kind: 'native' } : { kind: 'unavailable' };
    },
    set_value_native: function (el, a) {
      var d = valueDescriptor(el);
      if (!d || !d.set) throw fail('unsupported', 'no value setter');
      d.set.call(el, a.value);
    },
    assign_value: function (el, a) { el.value = a.value; },
    framework_handler: function (el, a) {
      var props = reactProps(el);
      if (!props || typeof props[a.prop] !== 'function') throw fail('unsupported', a.prop + ' is not bound');
      props[a.prop]({
        type: a.kind, target: el, currentTarget: el, nativeEvent: new Event(a.kind),
        preventDefault: function () {}, stopPropagation: function () {}, persist: function () {},
        isDefaultPrevented: function () { return false; }, isPropagationStopped: function () { return false; }
      });
    },
    override_value: function (el, a) {
      Object.defineProperty(el, 'value', {
        configurable: true,
        get: function () { return a.value; },
        set: function () {}
      });
    },
    dispatch: function (el, a) { el.dispatchEvent(makeEvent(a)); },
    focus: function (el) { el.focus(); },
    blur: function (el) { el.blur(); },
    scroll_into_view: function (el) { el.scrollIntoView({ block: 'center', inline: 'nearest' }); },
    activate: function (el) { el.click(); },
    select_option: function (el, a) {
      if (!el.options) throw fail('unsupported', 'not a select');
      if (a.index >= el.options.length) throw fail('unsupported', 'option ' + a.index + ' out of range');
      el.selectedIndex = a.index;
    },
    set_files: function (el, a) {
      if (typeOf(el) !== 'file') throw fail('unsupported', 'not a file input');
      var transfer = new DataTransfer();
      a.files.forEach(function (f) {
        transfer.items.add(new File([bytes(f.content)], f.name, { type: f.mime }));
      });
      el.files = transfer.files;
    },
    set_text_content: function (el, a) {
      if (!editable(el)) throw fail('unsupported', 'not editable');
      el.textContent = a.text;
    }
  };

  try {
    var op = ops[req.op];
    if (!op) throw fail('unsupported', 'unknown operation ' + req.op);
    if (req.token && req.token !== fp.token) throw fail('stale', 'document replaced');
    var el = req.slot === null || req.slot === undefined ? null : resolve(req.slot);
    var value = op(el, req.args || {});
    return reply('ok', { value: value === undefined ? null : value });
  } catch (e) {
    return reply('error', { error: { kind: e.fpKind || 'script', message: String(e && e.message || e) } });
  }
}"#;

/// One call into the page runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRequest<'a> {
    pub op: &'a str,
    /// Token of the load the handle was minted for.
    pub token: Option<&'a str>,
    pub slot: Option<u32>,
    pub args: Value,
}

impl ScriptRequest<'_> {
    /// `Runtime.evaluate` expression for this request.
    pub fn expression(&self) -> Result<String, DriverError> {
        let request = serde_json::to_string(self).map_err(|err| DriverError::Decode(err.to_string()))?;
        Ok(format!("({PAGE_RUNTIME})({request})"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptFailure {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptReply {
    pub status: String,
    pub token: String,
    pub url: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<ScriptFailure>,
}

impl ScriptReply {
    /// Decode a `Runtime.evaluate` result.
    pub fn from_evaluate(response: &Value) -> Result<Self, DriverError> {
        if let Some(details) = response.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("uncaught exception");
            return Err(DriverError::Script(message.to_string()));
        }
        let value = response
            .pointer("/result/value")
            .ok_or_else(|| DriverError::Decode("evaluate result carries no value".into()))?;
        serde_json::from_value(value.clone()).map_err(|err| DriverError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_is_embedded_as_a_literal() {
        let request = ScriptRequest {
            op: "query_css",
            token: Some("t1"),
            slot: None,
            args: json!({"selector": "input[name=\"email\"]"}),
        };
        let expression = request.expression().unwrap();
        assert!(expression.starts_with("(function (req) {"));
        assert!(expression.ends_with(
            r#"({"op":"query_css","token":"t1","slot":null,"args":{"selector":"input[name=\"email\"]"}})"#
        ));
    }

    #[test]
    fn replies_and_exceptions_decode() {
        let ok = json!({"result": {"type": "object", "value": {
            "status": "ok", "token": "abc", "url": "https://x.test/", "value": [0, 2]
        }}});
        let reply = ScriptReply::from_evaluate(&ok).unwrap();
        assert_eq!(reply.status, "ok");
        assert_eq!(reply.value, json!([0, 2]));
        assert_eq!(reply.error, None);

        let failed = json!({"result": {"value": {
            "status": "error", "token": "abc", "url": "https://x.test/",
            "error": {"kind": "selector", "message": "not valid"}
        }}});
        let reply = ScriptReply::from_evaluate(&failed).unwrap();
        assert_eq!(reply.error.unwrap().kind, "selector");

        let thrown = json!({"result": {}, "exceptionDetails": {
            "text": "Uncaught", "exception": {"description": "ReferenceError: x is not defined"}
        }});
        assert_eq!(
            ScriptReply::from_evaluate(&thrown),
            Err(DriverError::Script("ReferenceError: x is not defined".into()))
        );
    }
}
