//! Prompt enhancement collaborators.

use std::fmt;

use crate::pipeline::PromptEnhancer;

/// Kind of application a prompt describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    Ecommerce,
    Saas,
    Dashboard,
    Landing,
}

impl AppType {
    /// Keyword detection; ecommerce when nothing matches.
    pub fn detect(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();

        if contains_any(&lower, &["ecommerce", "shop", "store", "marketplace"]) {
            AppType::Ecommerce
        } else if contains_any(&lower, &["saas", "software", "platform"]) {
            AppType::Saas
        } else if contains_any(&lower, &["dashboard", "admin", "analytics"]) {
            AppType::Dashboard
        } else if contains_any(&lower, &["landing", "marketing", "promo"]) {
            AppType::Landing
        } else {
            AppType::Ecommerce
        }
    }

    /// Parse a caller-supplied domain hint.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "ecommerce" | "e-commerce" | "shop" | "store" => Some(AppType::Ecommerce),
            "saas" => Some(AppType::Saas),
            "dashboard" | "admin" => Some(AppType::Dashboard),
            "landing" | "marketing" => Some(AppType::Landing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Ecommerce => "ecommerce",
            AppType::Saas => "saas",
            AppType::Dashboard => "dashboard",
            AppType::Landing => "landing",
        }
    }

    fn blueprint(&self) -> Blueprint {
        match self {
            AppType::Ecommerce => Blueprint {
                architecture: &[
                    "Next.js with the App Router",
                    "Tailwind CSS styling",
                    "Context API with useReducer for state",
                    "Mock product data or an external API",
                    "Stripe checkout integration (mocked)",
                ],
                pages: &[
                    "Homepage with hero and featured products",
                    "Product catalogue with filters",
                    "Product detail page",
                    "Shopping cart",
                    "Checkout flow",
                    "User profile",
                ],
                components: &[
                    "Header with navigation and cart",
                    "ProductCard",
                    "SearchBar with filters",
                    "ShoppingCart sidebar",
                    "ProductGallery",
                    "ReviewStars",
                    "Footer",
                ],
                state: &["CartContext", "UserContext", "ProductsContext", "UIContext"],
                notes: &[
                    "Use realistic placeholder images",
                    "Make the filters functional",
                    "Persist the cart in localStorage",
                    "Include reviews and ratings",
                ],
            },
            AppType::Saas => Blueprint {
                architecture: &[
                    "Next.js with TypeScript",
                    "Tailwind CSS with accessible primitives",
                    "Context API for state",
                    "Next.js API routes",
                    "Session-based authentication",
                ],
                pages: &[
                    "Marketing landing page",
                    "Main dashboard",
                    "Settings and profile",
                    "Billing and pricing",
                    "Help center",
                ],
                components: &[
                    "Responsive navigation",
                    "Dashboard widgets",
                    "Data tables",
                    "Charts",
                    "Settings forms",
                    "Subscription management",
                ],
                state: &[
                    "AuthContext",
                    "AppContext",
                    "SubscriptionContext",
                    "NotificationContext",
                ],
                notes: &[
                    "Simulate realistic metrics on the dashboard",
                    "Add a multi-step onboarding flow",
                    "Support sorting and pagination in tables",
                    "Provide a dark and light theme",
                ],
            },
            AppType::Dashboard => Blueprint {
                architecture: &[
                    "Next.js with TypeScript",
                    "Tailwind CSS",
                    "A charting library for visualisations",
                    "Context API for state",
                    "Mock or external data source",
                ],
                pages: &[
                    "Overview",
                    "Detailed analytics",
                    "Data management",
                    "Reports and exports",
                    "User management",
                    "Settings",
                ],
                components: &[
                    "Sidebar navigation",
                    "StatCard for KPIs",
                    "Chart components",
                    "DataTable with pagination",
                    "FilterBar",
                    "ExportButton",
                ],
                state: &["DataContext", "UserContext", "FiltersContext", "UIContext"],
                notes: &[
                    "Make charts interactive",
                    "Add working date filters",
                    "Offer CSV export",
                    "Handle loading and error states",
                ],
            },
            AppType::Landing => Blueprint {
                architecture: &[
                    "Static Next.js export",
                    "Tailwind CSS",
                    "Lightweight animations",
                    "SEO metadata in the document head",
                ],
                pages: &[
                    "Homepage with sections",
                    "About page",
                    "Features page",
                    "Contact page",
                    "Pricing page",
                ],
                components: &[
                    "Hero section",
                    "Feature showcase",
                    "Testimonials carousel",
                    "Call-to-action buttons",
                    "Contact form",
                    "Footer with social links",
                ],
                state: &["ContactContext", "UIContext", "ThemeContext", "ModalContext"],
                notes: &[
                    "Keep animations smooth",
                    "Optimise calls to action for conversion",
                    "Add complete meta tags",
                    "Design mobile-first",
                ],
            },
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Blueprint {
    architecture: &'static [&'static str],
    pages: &'static [&'static str],
    components: &'static [&'static str],
    state: &'static [&'static str],
    notes: &'static [&'static str],
}

/// Rough size of the requested application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        })
    }
}

const FEATURE_KEYWORDS: &[(&str, &[&str])] = &[
    ("Authentication", &["auth", "login", "register", "sign up"]),
    ("Shopping cart", &["cart", "basket"]),
    ("Payment processing", &["payment", "stripe", "paypal", "checkout"]),
    ("Search and filtering", &["search", "filter"]),
    ("Admin panel", &["admin", "dashboard"]),
    ("Messaging", &["chat", "message"]),
];

fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

/// Features mentioned in the prompt, in a fixed order.
pub fn extract_features(prompt: &str) -> Vec<&'static str> {
    let lower = prompt.to_lowercase();
    FEATURE_KEYWORDS
        .iter()
        .filter(|(_, words)| contains_any(&lower, words))
        .map(|(feature, _)| *feature)
        .collect()
}

pub fn estimate_complexity(prompt: &str) -> Complexity {
    let words = prompt.split_whitespace().count();
    let features = extract_features(prompt).len();

    if words < 50 && features < 3 {
        Complexity::Simple
    } else if words < 150 && features < 6 {
        Complexity::Medium
    } else {
        Complexity::Complex
    }
}

fn bullet_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wraps the prompt in a thinking / planning / implementation /
/// verification scaffold chosen from the detected application type.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredPromptEnhancer;

impl StructuredPromptEnhancer {
    pub fn new() -> Self {
        Self
    }
}

impl PromptEnhancer for StructuredPromptEnhancer {
    fn enhance(&self, prompt: &str, domain_hint: Option<&str>) -> String {
        let app_type = domain_hint
            .and_then(AppType::from_hint)
            .unwrap_or_else(|| AppType::detect(prompt));
        let features = extract_features(prompt);
        let features = if features.is_empty() {
            "core functionality".to_string()
        } else {
            features.join(", ")
        };
        let complexity = estimate_complexity(prompt);
        let blueprint = app_type.blueprint();

        format!(
            "<thinking>\n\
             The user asked for: \"{prompt}\"\n\n\
             1. Application type: {app_type}\n\
             2. Main features: {features}\n\
             3. Estimated complexity: {complexity}\n\
             4. Stack: React/Next.js, Tailwind CSS, Context API\n\
             </thinking>\n\n\
             <planning>\n\
             Architecture:\n{architecture}\n\n\
             Pages:\n{pages}\n\n\
             Components:\n{components}\n\n\
             Global state:\n{state}\n\n\
             Specific requirements:\n{notes}\n\
             </planning>\n\n\
             <implementation>\n\
             Generate a complete application with a modern file structure, \
             functional React components with hooks, Next.js pages with routing, \
             responsive Tailwind styling, Context API state, API routes where needed \
             and full configuration. Every import must resolve to a generated file \
             and the app must start without errors.\n\
             </implementation>\n\n\
             <verification>\n\
             - Every component is exported correctly\n\
             - Imports match the generated files\n\
             - Tailwind usage is consistent\n\
             - React hooks follow the rules of hooks\n\
             </verification>\n\n\
             Now generate the complete application for: \"{prompt}\"",
            architecture = bullet_list(blueprint.architecture),
            pages = bullet_list(blueprint.pages),
            components = bullet_list(blueprint.components),
            state = bullet_list(blueprint.state),
            notes = bullet_list(blueprint.notes),
        )
    }
}

/// Sends prompts unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEnhancer;

impl PromptEnhancer for PassthroughEnhancer {
    fn enhance(&self, prompt: &str, _domain_hint: Option<&str>) -> String {
        prompt.to_string()
    }
}
