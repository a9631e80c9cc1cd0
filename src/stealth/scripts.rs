//! Stealth evasion JavaScript, parameterized by the session fingerprint.
//! Based on puppeteer-extra-plugin-stealth techniques.
//!
//! Scripts are registered to run on every new document, before any page script.

use super::fingerprint::AntiDetectionProfile;

const STATIC_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = window.chrome || {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix permissions
    r#"
    if (window.navigator.permissions) {
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications' ?
            Promise.resolve({ state: Notification.permission }) :
            originalQuery(parameters)
        );
    }
    "#,
    // Fix plugins (make it look like regular Chrome)
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // Remove automation-related properties
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    delete document.__webdriver_evaluate;
    delete document.__selenium_evaluate;
    "#,
    // Fix hairline feature detection
    r#"
    Object.defineProperty(HTMLElement.prototype, 'offsetHeight', {
        get: function() {
            if (this.id === 'modernizr') return 1;
            return this.getBoundingClientRect().height;
        }
    });
    "#,
];

/// Only the webdriver flag; used by the plain browser driver.
pub fn automation_flag_script() -> &'static str {
    STATIC_SCRIPTS[0]
}

/// Full script set for a stealth session.
pub fn stealth_scripts(fp: &AntiDetectionProfile) -> Vec<String> {
    let mut scripts: Vec<String> = STATIC_SCRIPTS.iter().map(|s| s.to_string()).collect();

    let languages = fp
        .languages
        .iter()
        .map(|l| format!("'{}'", js_escape(l)))
        .collect::<Vec<_>>()
        .join(", ");
    scripts.push(format!(
        r#"
    Object.defineProperty(navigator, 'languages', {{
        get: () => [{languages}],
        configurable: true
    }});
    Object.defineProperty(navigator, 'platform', {{
        get: () => '{platform}',
        configurable: true
    }});
    Object.defineProperty(navigator, 'deviceMemory', {{
        get: () => {memory},
        configurable: true
    }});
    Object.defineProperty(navigator, 'hardwareConcurrency', {{
        get: () => {cores},
        configurable: true
    }});
    "#,
        languages = languages,
        platform = js_escape(fp.platform),
        memory = fp.device_memory_gb,
        cores = fp.hardware_concurrency,
    ));

    // WebGL vendor/renderer (UNMASKED_VENDOR_WEBGL / UNMASKED_RENDERER_WEBGL)
    scripts.push(format!(
        r#"
    for (const ctx of [window.WebGLRenderingContext, window.WebGL2RenderingContext]) {{
        if (!ctx) continue;
        const getParameter = ctx.prototype.getParameter;
        ctx.prototype.getParameter = function(parameter) {{
            if (parameter === 37445) {{
                return '{vendor}';
            }}
            if (parameter === 37446) {{
                return '{renderer}';
            }}
            return getParameter.call(this, parameter);
        }};
    }}
    "#,
        vendor = js_escape(fp.webgl_vendor),
        renderer = js_escape(fp.webgl_renderer),
    ));

    scripts
}

fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
