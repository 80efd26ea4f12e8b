//! Navigation graph of the storefront.

use super::handlers::{
    ADD_TO_CART, APPLY_PROMO, ATTACH_IDENTITY, CREATE_GAME, DELETE_GAME, LIST_CART,
    REMOVE_CART_LINE, SAVE_PROFILE, UPDATE_CART_QUANTITY, UPDATE_GAME,
};
use crate::core::Guard;
use crate::graph::{GraphError, StateBuilder, StateGraph};

/// Public pages plus sign-out, reachable from nearly everywhere.
fn browsing(s: StateBuilder) -> StateBuilder {
    s.on("GO_HOME", "home")
        .on("GO_ABOUT", "about")
        .on("GO_CATEGORIES", "categories")
        .on("GO_DEALS", "deals")
        .on("GO_GAMES", "games")
        .on("LOGOUT", "idle")
}

fn shopping(s: StateBuilder) -> StateBuilder {
    browsing(s).on("GO_CART", "cart")
}

/// Build the storefront graph.
///
/// Shoppers browse public pages anonymously, sign in as a customer or a
/// seller, fill a cart, and check out once signed in. Sellers manage their
/// catalog in a nested sub-graph.
pub fn storefront_graph() -> Result<StateGraph, GraphError> {
    StateGraph::builder("idle")
        .state("idle", |s| shopping(s).on("LOGIN", "login").on("GO_SIGNUP", "signup"))
        .state("home", |s| shopping(s).on("LOGIN", "login").on("GO_SIGNUP", "signup"))
        .state("about", shopping)
        .state("categories", shopping)
        .state("deals", shopping)
        .state("games", |s| shopping(s).on_effect("ADD_TO_CART", "cart", ADD_TO_CART))
        .state("login", |s| {
            shopping(s)
                .on("LOGIN", "login")
                .on("CHOOSE_CUSTOMER", "authenticatingCustomer")
                .on("CHOOSE_SELLER", "authenticatingSeller")
                .on("GO_SIGNUP", "signup")
        })
        .state("signup", |s| {
            shopping(s)
                .on_effect("REGISTER", "login", ATTACH_IDENTITY)
                .on("LOGIN", "login")
                .on("GO_LOGIN", "login")
                .on("GO_FORGOT_PASSWORD", "forgotPassword")
        })
        .state("forgotPassword", |s| {
            shopping(s).on("GO_LOGIN", "login").on("GO_SIGNUP", "signup")
        })
        .state("authenticatingCustomer", |s| {
            s.on_effect("AUTHENTICATE", "customerView", ATTACH_IDENTITY)
                .on("FAILURE", "login")
                .on("GO_CART", "cart")
                .on("LOGOUT", "idle")
        })
        .state("authenticatingSeller", |s| {
            s.on_effect("AUTHENTICATE", "sellerDashboard", ATTACH_IDENTITY)
                .on("FAILURE", "login")
                .on("LOGOUT", "idle")
        })
        .state("customerView", |s| {
            shopping(s)
                .on("BROWSE_GAMES", "browseGames")
                .on_effect("ADD_TO_CART", "cart", ADD_TO_CART)
                .on_guarded("GO_CHECKOUT", "checkout", Guard::signed_in())
                .on("GO_PROFILE", "profileForm")
        })
        .state("browseGames", |s| {
            shopping(s)
                .on_effect("ADD_TO_CART", "cart", ADD_TO_CART)
                .on("BACK", "customerView")
                .on("EXPLORE_GAMES", "games")
        })
        .state("cart", |s| {
            shopping(s)
                .on_effect("ADD_TO_CART", "cart", ADD_TO_CART)
                .on_effect("UPDATE_QUANTITY", "cart", UPDATE_CART_QUANTITY)
                .on_effect("REMOVE_ITEM", "cart", REMOVE_CART_LINE)
                .on_effect("APPLY_PROMO", "cart", APPLY_PROMO)
                .on_effect("REFRESH_CART", "cart", LIST_CART)
                .on_guarded("PROCEED_TO_CHECKOUT", "checkout", Guard::signed_in())
                .on("CONTINUE_SHOPPING", "browseGames")
                .on("BACK", "browseGames")
                .on("GO_PROFILE", "profileForm")
        })
        .state("checkout", |s| {
            shopping(s).on("BACK", "cart").on("GO_PROFILE", "profileForm")
        })
        .state("profileForm", |s| {
            shopping(s)
                .on_effect("SAVE_PROFILE", "profileForm", SAVE_PROFILE)
                .on("SUBMIT_PROFILE", "customerView")
                .on("CANCEL", "customerView")
                .on("BACK", "customerView")
        })
        .state("sellerDashboard", |s| {
            browsing(s)
                .on("GO_GAME_MANAGEMENT", "sellerGameManagement")
                .on("GO_SALES_TRACKING", "sellerSalesTracking")
                .on("GO_PROFILE", "sellerProfile")
        })
        .composite("sellerGameManagement", "idle", |s| {
            browsing(s)
                .on("GO_PROFILE", "sellerProfile")
                .child("idle", |c| {
                    c.on("ADD_GAME", "addGame")
                        .on("EDIT_GAME", "editGame")
                        .on("DELETE_GAME", "deleteGame")
                        .on("SUBMIT", "#sellerDashboard")
                        .on("CANCEL", "#sellerDashboard")
                })
                .child("addGame", |c| {
                    c.on_effect("SAVE", "idle", CREATE_GAME)
                        .on("CANCEL", "idle")
                        .on("LOGOUT", "#idle")
                })
                .child("editGame", |c| {
                    c.on_effect("SAVE", "idle", UPDATE_GAME)
                        .on("CANCEL", "idle")
                        .on("LOGOUT", "#idle")
                })
                .child("deleteGame", |c| {
                    c.on_effect("CONFIRM_DELETE", "idle", DELETE_GAME)
                        .on("CANCEL", "idle")
                        .on("LOGOUT", "#idle")
                })
        })
        .state("sellerSalesTracking", |s| {
            browsing(s)
                .on("BACK", "sellerDashboard")
                .on("GO_PROFILE", "sellerProfile")
        })
        .state("sellerProfile", |s| {
            browsing(s)
                .on_effect("SAVE_PROFILE", "sellerProfile", SAVE_PROFILE)
                .on("SUBMIT_PROFILE", "sellerDashboard")
                .on("CANCEL", "sellerDashboard")
                .on("BACK", "sellerDashboard")
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, SessionContext, StatePath, UserIdentity};

    fn path(raw: &str) -> StatePath {
        StatePath::parse(raw)
    }

    #[test]
    fn graph_is_well_formed() {
        let graph = storefront_graph().unwrap();

        assert_eq!(graph.initial_path(), path("idle"));
        assert!(graph.contains(&path("sellerGameManagement.addGame")));
    }

    #[test]
    fn every_top_level_state_can_sign_out() {
        let graph = storefront_graph().unwrap();
        let ctx = SessionContext::new();

        for state in graph.paths() {
            assert_eq!(
                graph.target_state(&state, "LOGOUT", &ctx),
                Some(path("idle")),
                "LOGOUT from {state}"
            );
        }
    }

    #[test]
    fn no_state_is_terminal() {
        let graph = storefront_graph().unwrap();

        for state in graph.paths() {
            assert!(!graph.is_terminal(&state), "{state} is terminal");
        }
    }

    #[test]
    fn checkout_requires_sign_in() {
        let graph = storefront_graph().unwrap();
        let anonymous = SessionContext::new();
        let signed_in = SessionContext {
            user: Some(UserIdentity {
                id: 1,
                name: "Lee".to_string(),
                email: "lee@example.com".to_string(),
                role: Role::Gamer,
                seller_profile: None,
            }),
            ..SessionContext::default()
        };

        assert_eq!(graph.target_state(&path("cart"), "PROCEED_TO_CHECKOUT", &anonymous), None);
        assert_eq!(
            graph.target_state(&path("cart"), "PROCEED_TO_CHECKOUT", &signed_in),
            Some(path("checkout"))
        );
    }

    #[test]
    fn game_management_children_resolve_locally() {
        let graph = storefront_graph().unwrap();
        let ctx = SessionContext::new();

        assert_eq!(
            graph.target_state(&path("sellerDashboard"), "GO_GAME_MANAGEMENT", &ctx),
            Some(path("sellerGameManagement.idle"))
        );
        assert_eq!(
            graph.target_state(&path("sellerGameManagement.addGame"), "CANCEL", &ctx),
            Some(path("sellerGameManagement.idle"))
        );
        assert_eq!(
            graph.target_state(&path("sellerGameManagement.idle"), "SUBMIT", &ctx),
            Some(path("sellerDashboard"))
        );
        assert_eq!(
            graph.target_state(&path("sellerGameManagement.editGame"), "GO_PROFILE", &ctx),
            Some(path("sellerProfile"))
        );
    }

    #[test]
    fn idle_offers_public_navigation() {
        let graph = storefront_graph().unwrap();
        let legal = graph.legal_transitions(&path("idle"), &SessionContext::new());

        assert_eq!(
            legal,
            vec![
                "GO_ABOUT",
                "GO_CART",
                "GO_CATEGORIES",
                "GO_DEALS",
                "GO_GAMES",
                "GO_HOME",
                "GO_SIGNUP",
                "LOGIN",
                "LOGOUT",
            ]
        );
    }
}
