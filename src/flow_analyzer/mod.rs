pub mod predictive_model;
