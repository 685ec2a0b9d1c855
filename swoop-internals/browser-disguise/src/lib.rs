//! Swoop Browser Disguise
//! Copyright (c) 2026 Mamy Ratsimbazafy
//! Licensed and distributed under either of
//!   * MIT license (license terms at the root of the package or at http://opensource.org/licenses/MIT).
//!   * Apache v2 license (license terms at the root of the package or at http://www.apache.org/licenses/LICENSE-2.0).
//! at your option. This file may not be copied, modified, or distributed except according to those terms.

//! swoop-internals/browser-disguise
//! Randomized, plausible browser identities and the stealth script that hides
//! automation signals from the pages a headless browser visits.

use rand::seq::SliceRandom;
use rand::Rng;

/// A desktop Chrome identity. The user agent and the platform reported by
/// `navigator.platform` must describe the same machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Identity {
    user_agent: &'static str,
    platform: &'static str,
}

/// Only Chrome identities: the session runs Chrome, and a Firefox or Safari
/// user agent on top of a Chromium fingerprint is an easy tell.
const IDENTITIES: &[Identity] = &[
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "Win32",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        platform: "Win32",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
        platform: "Win32",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "MacIntel",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        platform: "MacIntel",
    },
    Identity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        platform: "Linux x86_64",
    },
];

/// Common desktop viewports.
const WINDOW_SIZES: &[(u32, u32)] = &[(1920, 1080), (1680, 1050), (1536, 864), (1440, 900), (1366, 768)];

/// The identity a single browser session presents to the site.
///
/// A `Disguise` is drawn once per session and never shared: reusing one
/// across sessions defeats the point of randomizing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disguise {
    pub user_agent: String,
    pub platform: String,
    pub accept_language: String,
    pub window_size: (u32, u32),
}

impl Disguise {
    /// Draw an identity from the thread-local RNG.
    pub fn random() -> Self {
        Self::from_rng(&mut rand::thread_rng())
    }

    /// Draw an identity from a caller-supplied RNG.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let identity = IDENTITIES.choose(rng).copied().unwrap_or(IDENTITIES[0]);
        let window_size = WINDOW_SIZES.choose(rng).copied().unwrap_or(WINDOW_SIZES[0]);
        Self {
            user_agent: identity.user_agent.to_string(),
            platform: identity.platform.to_string(),
            accept_language: "en-US".to_string(),
            window_size,
        }
    }

    /// Chrome command line flags carrying this identity.
    pub fn chrome_args(&self) -> Vec<String> {
        let (width, height) = self.window_size;
        vec![
            format!("--user-agent={}", self.user_agent),
            format!("--window-size={},{}", width, height),
            "--start-maximized".to_string(),
            "--disable-extensions".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--lang={}", self.accept_language),
        ]
    }

    /// JavaScript to install before any document script runs.
    pub fn stealth_script(&self) -> String {
        let primary_language = self
            .accept_language
            .split('-')
            .next()
            .unwrap_or("en")
            .to_string();
        STEALTH_TEMPLATE
            .replace("{{PLATFORM}}", &self.platform)
            .replace("{{LANGUAGE}}", &self.accept_language)
            .replace("{{PRIMARY_LANGUAGE}}", &primary_language)
    }
}

const STEALTH_TEMPLATE: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
Object.defineProperty(navigator, 'platform', { get: () => '{{PLATFORM}}', configurable: true });
Object.defineProperty(navigator, 'languages', { get: () => ['{{LANGUAGE}}', '{{PRIMARY_LANGUAGE}}'], configurable: true });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
Object.defineProperty(navigator, 'vendor', { get: () => 'Google Inc.', configurable: true });

if (!window.chrome) {
    window.chrome = {};
}
if (!window.chrome.runtime) {
    window.chrome.runtime = {
        connect: function() { return { onDisconnect: { addListener: function() {} }, postMessage: function() {} }; },
        sendMessage: function() {},
        onMessage: { addListener: function() {}, removeListener: function() {} },
    };
}

const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );
}

const getParameter = WebGLRenderingContext.prototype.getParameter;
WebGLRenderingContext.prototype.getParameter = function(parameter) {
    if (parameter === 37445) return 'Intel Inc.';
    if (parameter === 37446) return 'Intel Iris OpenGL Engine';
    return getParameter.apply(this, arguments);
};

delete window.__webdriver_script_fn;
delete window.__selenium;
delete window.callPhantom;
delete window._phantom;
delete document.__webdriver_evaluate;
delete document.__selenium_unwrapped;
delete document.__driver_evaluate;
delete document.__webdriver_script_function;
delete document.__fxdriver_evaluate;
for (const key of Object.keys(window)) {
    if (key.startsWith('cdc_')) {
        delete window[key];
    }
}
"#;
