/// Screens the client can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Profile,
    MyBooking,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let path = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match path {
            "/login" => Some(Route::Login),
            "/" => Some(Route::Dashboard),
            "/profile" => Some(Route::Profile),
            "/my-booking" => Some(Route::MyBooking),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/",
            Route::Profile => "/profile",
            Route::MyBooking => "/my-booking",
        }
    }

    pub fn is_protected(self) -> bool {
        self != Route::Login
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Show(Route),
    Redirect(Route),
}

impl Resolution {
    /// The route that ends up on screen.
    pub fn target(self) -> Route {
        match self {
            Resolution::Show(route) | Resolution::Redirect(route) => route,
        }
    }
}

/// Applies the access rules to a requested path.
pub fn resolve(path: &str, authenticated: bool) -> Resolution {
    let Some(route) = Route::from_path(path) else {
        return if authenticated {
            Resolution::Redirect(Route::Dashboard)
        } else {
            Resolution::Redirect(Route::Login)
        };
    };
    match (route, authenticated) {
        (Route::Login, true) => Resolution::Redirect(Route::Dashboard),
        (r, false) if r.is_protected() => Resolution::Redirect(Route::Login),
        (r, _) => Resolution::Show(r),
    }
}
