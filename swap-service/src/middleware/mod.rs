pub mod jwt_auth;
