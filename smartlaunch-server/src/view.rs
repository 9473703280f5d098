//! HTML views
//!
//! Pure functions from shaped data to markup. All user-derived text goes
//! through `html_escape`; chart data is embedded as JSON.

use html_escape::encode_text;
use smartlaunch_core::{Dashboard, LaunchError};

use crate::config::ServerConfig;

/// Inline error fragment shown for any aborted launch/callback
pub fn error_fragment(error: &LaunchError) -> String {
    format!("<h2>🚫 {}</h2>", encode_text(&error.user_message()))
}

/// Landing page explaining how to register the app with an EHR
pub fn index_page(config: &ServerConfig) -> String {
    INDEX_HTML
        .replace("{{launch_url}}", &encode_text(&config.launch_url()))
        .replace("{{redirect_uri}}", &encode_text(&config.smart.redirect_uri))
        .replace("{{client_id}}", &encode_text(&config.smart.client_id))
        .replace("{{scope}}", &encode_text(&config.smart.scope))
}

fn list_items(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("<li class=\"empty\">{}</li>", empty);
    }
    items
        .iter()
        .map(|item| format!("<li>{}</li>", encode_text(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON safe to place inside a `<script>` element
fn script_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/")
}

/// Patient dashboard
pub fn dashboard_page(dashboard: &Dashboard) -> String {
    let observation_rows = if dashboard.observations.is_empty() {
        "<tr><td colspan=\"2\" class=\"empty\">No vital signs recorded</td></tr>".to_string()
    } else {
        dashboard
            .observations
            .iter()
            .map(|o| {
                format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    encode_text(&o.label),
                    encode_text(&o.value)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    DASHBOARD_HTML
        .replace("{{patient_name}}", &encode_text(&dashboard.patient.name))
        .replace("{{patient_id}}", &encode_text(&dashboard.patient_id))
        .replace(
            "{{conditions}}",
            &list_items(&dashboard.conditions, "No conditions recorded"),
        )
        .replace(
            "{{medications}}",
            &list_items(&dashboard.medications, "No medications recorded"),
        )
        .replace("{{observation_rows}}", &observation_rows)
        .replace("{{chart_json}}", &script_json(&dashboard.chart))
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="icon" href="data:,">
<title>SMART Launcher</title>
<style>
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         background: #f5f5f5; color: #333; line-height: 1.6; margin: 0; }
  .header { background: #2c3e50; color: #fff; padding: 20px 32px; }
  .container { max-width: 760px; margin: 24px auto; padding: 0 16px; }
  .card { background: #fff; border-radius: 8px; padding: 20px 24px; margin-bottom: 16px;
          box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
  code { background: #f0f0f0; padding: 2px 6px; border-radius: 3px; }
</style>
</head>
<body>
<div class="header"><h1>SMART Launcher</h1></div>
<div class="container">
  <div class="card">
    <p>Register this app with your EHR or SMART sandbox, then start an EHR launch.</p>
    <ul>
      <li>Launch URL: <code>{{launch_url}}</code></li>
      <li>Redirect URI: <code>{{redirect_uri}}</code></li>
      <li>Client ID: <code>{{client_id}}</code></li>
      <li>Scopes: <code>{{scope}}</code></li>
    </ul>
  </div>
</div>
</body>
</html>
"##;

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="icon" href="data:,">
<title>Patient Dashboard</title>
<script src="https://cdn.jsdelivr.net/npm/chart.js@4"></script>
<style>
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         background: #f5f5f5; color: #333; line-height: 1.6; }
  .header { background: #2c3e50; color: #fff; padding: 20px 32px; }
  .header h1 { font-size: 24px; font-weight: 600; }
  .header .sub { color: #95a5a6; font-size: 14px; margin-top: 4px; }
  .container { max-width: 960px; margin: 24px auto; padding: 0 16px; }
  .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); gap: 16px; }
  .card { background: #fff; border-radius: 8px; padding: 20px 24px; margin-bottom: 16px;
          box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
  .card h2 { font-size: 16px; color: #7f8c8d; margin-bottom: 12px; text-transform: uppercase;
             letter-spacing: 0.5px; }
  .card li { margin-left: 18px; }
  .empty { color: #bbb; list-style: none; }
  .obs-table { width: 100%; border-collapse: collapse; font-size: 14px; }
  .obs-table th { text-align: left; padding: 8px 12px; border-bottom: 2px solid #eee;
                  color: #95a5a6; font-weight: 600; }
  .obs-table td { padding: 6px 12px; border-bottom: 1px solid #f0f0f0; }
</style>
</head>
<body>

<div class="header">
  <h1>{{patient_name}}</h1>
  <div class="sub">Patient ID: {{patient_id}}</div>
</div>

<div class="container">
  <div class="grid">
    <div class="card">
      <h2>Conditions</h2>
      <ul id="conditions">
{{conditions}}
      </ul>
    </div>
    <div class="card">
      <h2>Medications</h2>
      <ul id="medications">
{{medications}}
      </ul>
    </div>
  </div>

  <div class="card">
    <h2>Vital Signs</h2>
    <table class="obs-table">
      <thead><tr><th>Observation</th><th>Value</th></tr></thead>
      <tbody id="observations">
{{observation_rows}}
      </tbody>
    </table>
  </div>

  <div class="card">
    <h2>Trends</h2>
    <canvas id="vitals-chart" height="120"></canvas>
  </div>
</div>

<script id="chart-data" type="application/json">{{chart_json}}</script>
<script>
(function () {
  const points = JSON.parse(document.getElementById('chart-data').textContent);
  if (!points.length || typeof Chart === 'undefined') return;

  const series = {};
  for (const p of points) {
    (series[p.label] = series[p.label] || []).push({ x: p.time, y: p.num });
  }
  const datasets = Object.keys(series).map(label => ({
    label,
    data: series[label].sort((a, b) => a.x.localeCompare(b.x)),
    tension: 0.2
  }));

  new Chart(document.getElementById('vitals-chart'), {
    type: 'line',
    data: { datasets },
    options: { parsing: true, scales: { x: { type: 'category' } } }
  });
})();
</script>
</body>
</html>
"##;
