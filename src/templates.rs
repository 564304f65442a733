//! Sample report templates and content for testing and demonstration.
//!
//! The invoice uses the bracket dialect, the quarterly report the tag
//! dialect. Both are complete documents whose `<body>` holds the section
//! definitions, so they can be wrapped as-is.

use serde_json::{json, Value};

/// Invoice template, bracket dialect. Sections: `invoice`, `lines`, `status`.
pub fn invoice_template() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Invoice</title>
</head>
<body>
$$[invoice]$$
<div class="invoice"%%style[$.style.box, true]%%>
    <h1>Invoice {{$.number}}</h1>
    <p class="customer">{{$.customer.name}}</p>
    %%section[$.content]%%
</div>
!![invoice]!!

$$[lines]$$
<table>
    <tr><th>#</th><th>Item</th><th>Qty</th><th>Amount</th></tr>
    %%for[line, i]{$.lines}%%
    <tr><td>{{i + 1}}</td><td>{{line.item}}</td><td>{{line.qty}}</td><td>{{(line.qty * line.price).toFixed(2)}}</td></tr>
    %%endfor%%
</table>
!![lines]!!

$$[status]$$
%%if{$.paid}%%<p class="paid">Paid, thank you.</p>%%else-if{$.overdue_days > 30}%%<p class="late">Overdue by {{$.overdue_days}} days</p>%%else%%<p>Due {{$.due}}</p>%%endif%%
!![status]!!
</body>
</html>
"##
}

/// Content tree for [`invoice_template`].
pub fn invoice_content() -> Value {
    json!([{
        "type": "invoice",
        "number": "2024-001",
        "customer": {"name": "ACME Corp"},
        "style": {"box": {"border": "1px solid #000", "padding_left": "4px"}},
        "content": [
            {
                "type": "lines",
                "lines": [
                    {"item": "Design", "qty": 2, "price": 150},
                    {"item": "Hosting", "qty": 1, "price": 20.5}
                ]
            },
            {"type": "status", "paid": false, "overdue_days": 45, "due": "2024-12-01"}
        ]
    }])
}

/// Quarterly report template, tag dialect. Sections: `report`, `metric`,
/// `list`.
pub fn report_template() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Quarterly report</title>
</head>
<body>
<a-define-section [report]>
<div class="card" style="<a-style[$.style.card]/>">
    <h2>{{$.title}}</h2>
    <a-section [$.content] />
</div>
</a-define-section [report]>

<a-define-section [metric]>
<a-if condition="$.value >= $.target">
    <p class="ok">{{$.label}}: {{$.value}}</p>
<a-else-if condition="$.value >= $.target * 0.8" />
    <p class="warn">{{$.label}}: {{$.value}}</p>
<a-else />
    <p class="bad">{{$.label}}: {{$.value}}</p>
</a-if>
</a-define-section [metric]>

<a-define-section [list]>
<ul>
<a-for [entry] array="$.entries"><li<a-style[entry.style, true]/>>{{entry.text}}</li></a-for>
</ul>
</a-define-section [list]>
</body>
</html>
"##
}

/// Content tree for [`report_template`].
pub fn report_content() -> Value {
    json!([{
        "type": "report",
        "title": "Q4",
        "style": {"card": {"background": "#eee"}},
        "content": [
            {"type": "metric", "label": "Revenue", "value": 120, "target": 100},
            {"type": "metric", "label": "Retention", "value": 85, "target": 100},
            {"type": "metric", "label": "NPS", "value": 10, "target": 100},
            {
                "type": "list",
                "entries": [
                    {"text": "Launched billing", "style": {"font_weight": "bold"}},
                    {"text": "Hired two engineers"}
                ]
            }
        ]
    }])
}

/// Smallest useful template: one section printing `text`.
pub fn minimal_template() -> &'static str {
    "<html><head></head><body>$$[text]$$<p>{{$.text}}</p>!![text]!!</body></html>"
}
