//! Well-known symbols and the modules they are imported from.

use crate::utils::config::SymbolOverride;
use std::collections::HashMap;

/// `(name, module, is_default, is_type_only)`
pub const WELL_KNOWN_SYMBOLS: &[(&str, &str, bool, bool)] = &[
    // react
    ("React", "react", true, false),
    ("useState", "react", false, false),
    ("useEffect", "react", false, false),
    ("useLayoutEffect", "react", false, false),
    ("useRef", "react", false, false),
    ("useMemo", "react", false, false),
    ("useCallback", "react", false, false),
    ("useContext", "react", false, false),
    ("useReducer", "react", false, false),
    ("useId", "react", false, false),
    ("useTransition", "react", false, false),
    ("createContext", "react", false, false),
    ("forwardRef", "react", false, false),
    ("memo", "react", false, false),
    ("lazy", "react", false, false),
    ("Fragment", "react", false, false),
    ("Suspense", "react", false, false),
    ("StrictMode", "react", false, false),
    ("ReactNode", "react", false, true),
    ("FC", "react", false, true),
    ("PropsWithChildren", "react", false, true),
    ("ComponentProps", "react", false, true),
    ("CSSProperties", "react", false, true),
    ("ChangeEvent", "react", false, true),
    ("FormEvent", "react", false, true),
    ("createRoot", "react-dom/client", false, false),
    // react-router-dom
    ("BrowserRouter", "react-router-dom", false, false),
    ("Routes", "react-router-dom", false, false),
    ("Route", "react-router-dom", false, false),
    ("Link", "react-router-dom", false, false),
    ("NavLink", "react-router-dom", false, false),
    ("Navigate", "react-router-dom", false, false),
    ("Outlet", "react-router-dom", false, false),
    ("useNavigate", "react-router-dom", false, false),
    ("useParams", "react-router-dom", false, false),
    ("useLocation", "react-router-dom", false, false),
    ("useSearchParams", "react-router-dom", false, false),
    // lucide-react
    ("ArrowLeft", "lucide-react", false, false),
    ("ArrowRight", "lucide-react", false, false),
    ("Calendar", "lucide-react", false, false),
    ("Check", "lucide-react", false, false),
    ("ChevronDown", "lucide-react", false, false),
    ("ChevronLeft", "lucide-react", false, false),
    ("ChevronRight", "lucide-react", false, false),
    ("ChevronUp", "lucide-react", false, false),
    ("Edit", "lucide-react", false, false),
    ("Heart", "lucide-react", false, false),
    ("Home", "lucide-react", false, false),
    ("Loader2", "lucide-react", false, false),
    ("Mail", "lucide-react", false, false),
    ("Menu", "lucide-react", false, false),
    ("Minus", "lucide-react", false, false),
    ("Moon", "lucide-react", false, false),
    ("Plus", "lucide-react", false, false),
    ("Search", "lucide-react", false, false),
    ("Settings", "lucide-react", false, false),
    ("Star", "lucide-react", false, false),
    ("Sun", "lucide-react", false, false),
    ("Trash2", "lucide-react", false, false),
    ("User", "lucide-react", false, false),
    ("X", "lucide-react", false, false),
    // date-fns
    ("format", "date-fns", false, false),
    ("addDays", "date-fns", false, false),
    ("subDays", "date-fns", false, false),
    ("parseISO", "date-fns", false, false),
    ("isToday", "date-fns", false, false),
    ("isSameDay", "date-fns", false, false),
    ("differenceInDays", "date-fns", false, false),
    ("formatDistanceToNow", "date-fns", false, false),
    ("startOfWeek", "date-fns", false, false),
    ("endOfWeek", "date-fns", false, false),
    // utilities
    ("clsx", "clsx", true, false),
    ("motion", "framer-motion", false, false),
    ("AnimatePresence", "framer-motion", false, false),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownSymbol {
    pub module: String,
    pub is_default: bool,
    pub is_type_only: bool,
}

/// Read-only lookup from identifier to import source. Build once, share via `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: HashMap<String, WellKnownSymbol>,
}

impl SymbolTable {
    pub fn well_known() -> Self {
        let entries = WELL_KNOWN_SYMBOLS
            .iter()
            .map(|(name, module, is_default, is_type_only)| {
                (
                    name.to_string(),
                    WellKnownSymbol {
                        module: module.to_string(),
                        is_default: *is_default,
                        is_type_only: *is_type_only,
                    },
                )
            })
            .collect();
        SymbolTable { entries }
    }

    /// The built-in table plus configured entries. A configured name replaces a built-in one.
    pub fn with_overrides(overrides: &[SymbolOverride]) -> Self {
        let mut table = Self::well_known();
        for symbol in overrides {
            table.entries.insert(
                symbol.name.clone(),
                WellKnownSymbol {
                    module: symbol.module.clone(),
                    is_default: symbol.default,
                    is_type_only: symbol.type_only,
                },
            );
        }
        table
    }

    pub fn lookup(&self, name: &str) -> Option<&WellKnownSymbol> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
