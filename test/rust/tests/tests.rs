mod deployment_tests;
