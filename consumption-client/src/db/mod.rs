pub mod consumption_queries;
